//! Sample databases: every snapshot for a handful of artists, copied out of a
//! canonical file for local inspection.

use crate::bulk_writer::BulkWriter;
use crate::db::{open_database, DatabaseConfig};
use crate::models::SnapshotRow;
use crate::schema::{create_indexes, create_snapshot_table, SNAPSHOT_TABLE};
use crate::{LibraryError, Result};
use std::path::Path;
use tracing::{info, instrument};

/// Upper bound on ids per sample.
pub const MAX_SAMPLE_IDS: usize = 50;

#[derive(Debug, Clone)]
pub struct SampleOptions {
    pub ids: Vec<String>,
    pub skip_indexes: bool,
}

/// Copy all snapshots of `options.ids` from `source` into `target`, ordered by
/// timestamp. Only the first [`MAX_SAMPLE_IDS`] ids are used.
///
/// Returns the number of rows written.
#[instrument(skip_all, fields(source = %source.display(), target = %target.display()))]
pub async fn create_sample(source: &Path, target: &Path, options: &SampleOptions) -> Result<u64> {
    let ids: Vec<&String> = options.ids.iter().take(MAX_SAMPLE_IDS).collect();
    if ids.is_empty() {
        return Err(LibraryError::InvalidInput {
            field: "ids".to_string(),
            message: "at least one artist id is required".to_string(),
        });
    }

    let source_pool = open_database(DatabaseConfig::new(source).read_only(true)).await?;

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, timestamp, followers, popularity FROM {} WHERE id IN ({}) ORDER BY timestamp ASC",
        SNAPSHOT_TABLE, placeholders
    );
    let mut query = sqlx::query_as::<_, SnapshotRow>(&sql);
    for id in &ids {
        query = query.bind(id.as_str());
    }
    let rows = query.fetch_all(&source_pool).await?;
    source_pool.close().await;

    let target_pool = open_database(DatabaseConfig::new(target).create_if_missing(true)).await?;
    create_snapshot_table(&target_pool, false).await?;

    let row_count = rows.len();
    let mut writer = BulkWriter::new(target_pool.clone(), row_count.max(1));
    writer.extend(rows);
    writer.flush().await?;

    if !options.skip_indexes {
        create_indexes(&target_pool).await?;
    }
    target_pool.close().await;

    info!(ids = ids.len(), rows = row_count, "Sample database written");
    Ok(writer.inserted())
}
