//! Moves shards and the canonical file between local disk and the buckets.

use crate::error::Result;
use core_library::ShardRegistry;
use core_runtime::config::{BucketNames, PipelineConfig};
use core_runtime::logging::PhaseTimer;
use core_storage::{ObjectStoreGateway, StorageError, TransferReport};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDownloadReport {
    pub remote: usize,
    pub already_local: usize,
    pub downloaded: Vec<PathBuf>,
}

pub struct ShardTransfers {
    gateway: Arc<ObjectStoreGateway>,
    registry: ShardRegistry,
    buckets: BucketNames,
}

impl ShardTransfers {
    pub fn new(gateway: Arc<ObjectStoreGateway>, registry: ShardRegistry, buckets: BucketNames) -> Self {
        Self {
            gateway,
            registry,
            buckets,
        }
    }

    pub fn from_config(config: &PipelineConfig, gateway: Arc<ObjectStoreGateway>) -> Self {
        Self::new(
            gateway,
            ShardRegistry::new(config.layout.clone()),
            config.buckets.clone(),
        )
    }

    pub fn gateway(&self) -> &ObjectStoreGateway {
        &self.gateway
    }

    /// Download every remote shard that is not on local disk yet.
    #[instrument(skip(self))]
    pub async fn download_missing_shards(&self) -> Result<ShardDownloadReport> {
        let bucket = &self.buckets.snapshots;
        let prefix = self.registry.layout().shard_prefix.as_str();

        let remote: Vec<String> = self
            .gateway
            .list(bucket, Some(prefix))
            .await?
            .into_iter()
            .map(|object| object.key)
            .filter(|key| self.registry.is_shard_name(key))
            .collect();
        let local: HashSet<String> = self
            .registry
            .list()
            .await?
            .into_iter()
            .map(|shard| shard.file_name)
            .collect();

        let missing: Vec<String> = remote
            .iter()
            .filter(|key| !local.contains(key.as_str()))
            .cloned()
            .collect();
        let already_local = remote.len() - missing.len();

        let timer = PhaseTimer::start(
            "download_shards",
            format!(
                "Downloading {} partial databases ({} found locally)",
                missing.len(),
                already_local
            ),
        );
        let downloaded = self
            .gateway
            .download_objects(bucket, &missing, self.registry.data_dir())
            .await?;
        timer.finish();

        Ok(ShardDownloadReport {
            remote: remote.len(),
            already_local,
            downloaded,
        })
    }

    /// Upload a local file under its own file name.
    pub async fn upload_file(&self, bucket: &str, path: &Path) -> Result<TransferReport> {
        let key = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
        Ok(self.gateway.upload(bucket, &key, path).await?)
    }

    /// Durable copy of a freshly collected shard.
    pub async fn upload_shard(&self, path: &Path) -> Result<TransferReport> {
        self.upload_file(&self.buckets.snapshots, path).await
    }

    /// Upload a merge result to the snapshots bucket.
    pub async fn upload_canonical(&self, path: &Path) -> Result<TransferReport> {
        self.upload_file(&self.buckets.snapshots, path).await
    }

    /// Copy the canonical file from the snapshots bucket into the backups
    /// bucket. Without an explicit key the backup is named after `timestamp`.
    #[instrument(skip(self))]
    pub async fn backup_canonical(
        &self,
        backup_key: Option<&str>,
        timestamp: i64,
    ) -> Result<TransferReport> {
        let source_key = self.registry.layout().canonical_name.clone();
        let target_key = match backup_key {
            Some(key) => key.to_string(),
            None => backup_key_for(&source_key, timestamp),
        };

        info!(source = %source_key, target = %target_key, "Backing up canonical database");
        Ok(self
            .gateway
            .copy(
                &self.buckets.snapshots,
                &source_key,
                &self.buckets.backups,
                &target_key,
            )
            .await?)
    }
}

/// `merged-spotify-data.db` -> `merged-spotify-data.<timestamp>.db`
pub fn backup_key_for(canonical_name: &str, timestamp: i64) -> String {
    match canonical_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => {
            format!("{}.{}.{}", stem, timestamp, extension)
        }
        _ => format!("{}.{}", canonical_name, timestamp),
    }
}
