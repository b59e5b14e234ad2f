//! # Merge Engine
//!
//! Folds every local shard into one canonical database.
//!
//! ## Workflow
//!
//! 1. List local shards.
//! 2. Unless disabled, pick the checkpoint (largest shard at or above the
//!    configured floor) and copy its bytes to the staging file. It is then
//!    dropped from the list of shards to merge.
//! 3. Open the staging file. If its snapshot table carries
//!    `UNIQUE(id, timestamp)` it is rebuilt without it in one transaction.
//! 4. Switch to bulk-load pragmas.
//! 5. For each remaining shard, page through its rows and feed a
//!    [`BulkWriter`] that commits once `flush_threshold` rows are buffered.
//! 6. Collapse duplicate `(id, timestamp)` rows, keeping the first inserted.
//! 7. Unless disabled, build the `id` and `timestamp` indexes.
//! 8. Rename the staging file over the target.
//!
//! The target only appears once the whole run has succeeded. A staging file
//! left by an interrupted run is discarded at the next start, so a merge is
//! always restarted from scratch.

use crate::error::Result;
use core_library::db::{apply_bulk_load_pragmas, open_database, DatabaseConfig};
use core_library::schema::{
    count_snapshots, create_indexes, create_snapshot_table, dedupe_by_natural_key,
    drop_unique_constraint,
};
use core_library::{find_checkpoint, BulkWriter, PageCursor, ShardFile, ShardRegistry};
use core_runtime::config::{MergeSettings, PipelineConfig};
use core_runtime::logging::{bytes_to_mb, PhaseTimer};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Merge behavior switches, one per CLI flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Start from an empty target even when a checkpoint exists
    pub skip_checkpoint_as_base: bool,
    pub skip_indexes: bool,
    /// Target file. Relative paths resolve against the data directory.
    pub target: Option<PathBuf>,
    /// Name the target after the earliest and latest shard timestamps
    pub use_range_filename: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub target: PathBuf,
    pub checkpoint: Option<PathBuf>,
    pub constraint_dropped: bool,
    pub shards_merged: usize,
    pub rows_read: u64,
    pub rows_inserted: u64,
    pub duplicates_removed: u64,
    pub flushes: u64,
    /// Rows in the finished target
    pub total_rows: u64,
    pub indexes_created: bool,
}

/// `<target>.partial`
pub fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

pub struct MergeEngine {
    registry: ShardRegistry,
    settings: MergeSettings,
}

impl MergeEngine {
    pub fn new(registry: ShardRegistry, settings: MergeSettings) -> Self {
        Self { registry, settings }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            ShardRegistry::new(config.layout.clone()),
            config.merge.clone(),
        )
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Where the merge for `shards` writes to.
    pub fn resolve_target(&self, options: &MergeOptions, shards: &[ShardFile]) -> PathBuf {
        if let Some(target) = &options.target {
            return self.registry.data_dir().join(target);
        }

        if options.use_range_filename {
            let earliest = shards.iter().map(|shard| shard.timestamp).min();
            let latest = shards.iter().map(|shard| shard.timestamp).max();
            if let (Some(earliest), Some(latest)) = (earliest, latest) {
                return self.registry.range_path(earliest, latest);
            }
        }

        self.registry.layout().canonical_path()
    }

    #[instrument(skip(self))]
    pub async fn merge(&self, options: &MergeOptions) -> Result<MergeReport> {
        let shards = self.registry.list().await?;
        let target = self.resolve_target(options, &shards);
        let staging = staging_path(&target);

        if tokio::fs::try_exists(&staging).await? {
            warn!(staging = %staging.display(), "Discarding staging file from an interrupted merge");
            tokio::fs::remove_file(&staging).await?;
        }

        let timer = PhaseTimer::start(
            "merge",
            format!("Merging {} partial databases into {}", shards.len(), target.display()),
        );

        let report = match self.build(options, &shards, &target, &staging).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, staging = %staging.display(), "Merge failed, removing staging file");
                if let Err(remove_error) = tokio::fs::remove_file(&staging).await {
                    debug!(error = %remove_error, "Staging file not removed");
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&staging, &target).await?;

        info!(
            target = %target.display(),
            shards = report.shards_merged,
            rows = report.total_rows,
            duplicates_removed = report.duplicates_removed,
            "Merge complete"
        );
        timer.finish();
        Ok(report)
    }

    async fn build(
        &self,
        options: &MergeOptions,
        shards: &[ShardFile],
        target: &Path,
        staging: &Path,
    ) -> Result<MergeReport> {
        let checkpoint = if options.skip_checkpoint_as_base {
            None
        } else {
            find_checkpoint(shards, self.settings.checkpoint_min_bytes)
        };

        if let Some(checkpoint) = checkpoint {
            let timer = PhaseTimer::start(
                "checkpoint_copy",
                format!(
                    "Found checkpoint db '{}' ({}), copying to use as base",
                    checkpoint.file_name,
                    bytes_to_mb(checkpoint.size)
                ),
            );
            tokio::fs::copy(&checkpoint.path, staging).await?;
            timer.finish();
        } else if tokio::fs::try_exists(target).await? {
            debug!(target = %target.display(), "No checkpoint, extending the existing target");
            tokio::fs::copy(target, staging).await?;
        } else {
            debug!("No checkpoint, starting from an empty target");
        }

        let sources: Vec<&ShardFile> = shards
            .iter()
            .filter(|shard| checkpoint.map_or(true, |c| c.path != shard.path))
            .collect();

        let pool = open_database(DatabaseConfig::new(staging).create_if_missing(true)).await?;
        let result = self.fill(options, &pool, &sources).await;
        pool.close().await;
        let mut report = result?;

        report.target = target.to_path_buf();
        report.checkpoint = checkpoint.map(|c| c.path.clone());
        Ok(report)
    }

    async fn fill(
        &self,
        options: &MergeOptions,
        pool: &SqlitePool,
        sources: &[&ShardFile],
    ) -> Result<MergeReport> {
        create_snapshot_table(pool, false).await?;
        let constraint_dropped = drop_unique_constraint(pool).await?;
        apply_bulk_load_pragmas(pool).await?;

        let mut writer = BulkWriter::new(pool.clone(), self.settings.flush_threshold);
        let mut rows_read = 0;

        for (index, shard) in sources.iter().enumerate() {
            info!(
                shard = %shard.file_name,
                "Reading rows ({}/{})",
                index + 1,
                sources.len()
            );
            rows_read += self.merge_shard(shard, &mut writer).await?;
        }

        writer.flush().await?;
        debug!(inserted = writer.inserted(), flushes = writer.flushes(), "Flushed remaining rows");

        let duplicates_removed = dedupe_by_natural_key(pool).await?;
        if duplicates_removed > 0 {
            info!(duplicates_removed, "Collapsed duplicate snapshots");
        }

        let indexes_created = !options.skip_indexes;
        if indexes_created {
            let timer = PhaseTimer::start("create_indexes", "Creating indexes");
            create_indexes(pool).await?;
            timer.finish();
        }

        let total_rows = count_snapshots(pool).await?;

        Ok(MergeReport {
            target: PathBuf::new(),
            checkpoint: None,
            constraint_dropped,
            shards_merged: sources.len(),
            rows_read,
            rows_inserted: writer.inserted(),
            duplicates_removed,
            flushes: writer.flushes(),
            total_rows,
            indexes_created,
        })
    }

    /// Stream one shard's rows into `writer`. Returns the rows read.
    async fn merge_shard(&self, shard: &ShardFile, writer: &mut BulkWriter) -> Result<u64> {
        let source = open_database(DatabaseConfig::new(&shard.path).read_only(true)).await?;
        let result = copy_pages(&source, self.settings.page_size, writer).await;
        source.close().await;
        result
    }
}

async fn copy_pages(source: &SqlitePool, page_size: u32, writer: &mut BulkWriter) -> Result<u64> {
    let mut cursor = PageCursor::open(source.clone(), page_size).await?;
    let mut rows_read = 0;

    while let Some(page) = cursor.next_page().await? {
        rows_read += page.items.len() as u64;
        writer.extend(page.items);
        if writer.flush_if_needed().await? {
            info!(rows_read, total = cursor.total(), "Flushed at threshold");
        }
    }
    Ok(rows_read)
}

/// Build the `id` and `timestamp` indexes on an existing canonical file.
#[instrument]
pub async fn create_indexes_on(path: &Path) -> Result<()> {
    let pool = open_database(DatabaseConfig::new(path)).await?;
    let timer = PhaseTimer::start(
        "create_indexes",
        format!("Creating indexes on {}", path.display()),
    );
    let result = create_indexes(&pool).await;
    pool.close().await;
    result?;
    timer.finish();
    Ok(())
}
