//! # Retention
//!
//! Removes shards that have already been folded into the canonical database.
//!
//! A shard is stale only when it exists both locally and in the snapshots
//! bucket: the local copy proves it was available to the last merge, the
//! remote copy proves it was durably stored. Local and remote deletion are
//! independent. Both recompute the intersection on every call, so a
//! partially failed run can simply be repeated.

use crate::error::Result;
use bridge_traits::prompt::ConfirmationPrompt;
use core_library::{ShardFile, ShardRegistry};
use core_runtime::logging::PhaseTimer;
use core_storage::ObjectStoreGateway;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionOptions {
    /// Log the candidates and stop
    pub dry: bool,
    pub skip_confirmation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    NothingToDelete,
    DryRun { candidates: Vec<String> },
    /// The operator answered anything but yes
    Declined { candidates: Vec<String> },
    Deleted {
        requested: usize,
        /// Names or keys confirmed gone
        deleted: Vec<String>,
    },
}

/// Names present in both `local` and `remote`, in `local` order.
pub fn stale_intersection<'r>(
    local: &[String],
    remote: impl IntoIterator<Item = &'r str>,
) -> Vec<String> {
    let remote: HashSet<&str> = remote.into_iter().collect();
    local
        .iter()
        .filter(|name| remote.contains(name.as_str()))
        .cloned()
        .collect()
}

pub struct Retention {
    gateway: Arc<ObjectStoreGateway>,
    registry: ShardRegistry,
    bucket: String,
    prompt: Arc<dyn ConfirmationPrompt>,
}

impl Retention {
    pub fn new(
        gateway: Arc<ObjectStoreGateway>,
        registry: ShardRegistry,
        bucket: impl Into<String>,
        prompt: Arc<dyn ConfirmationPrompt>,
    ) -> Self {
        Self {
            gateway,
            registry,
            bucket: bucket.into(),
            prompt,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Local shards that also exist in the bucket.
    pub async fn stale_local(&self) -> Result<Vec<ShardFile>> {
        let local = self.registry.list().await?;
        let names: Vec<String> = local.iter().map(|s| s.file_name.clone()).collect();
        let stale: HashSet<String> = self.intersect(&names).await?.into_iter().collect();

        Ok(local
            .into_iter()
            .filter(|shard| stale.contains(&shard.file_name))
            .collect())
    }

    /// Remote shard keys that also exist locally.
    pub async fn stale_remote(&self) -> Result<Vec<String>> {
        let local: Vec<String> = self
            .registry
            .list()
            .await?
            .into_iter()
            .map(|shard| shard.file_name)
            .collect();
        self.intersect(&local).await
    }

    async fn intersect(&self, local: &[String]) -> Result<Vec<String>> {
        let prefix = self.registry.layout().shard_prefix.as_str();
        let remote = self.gateway.list(&self.bucket, Some(prefix)).await?;
        let remote_keys = remote
            .iter()
            .map(|object| object.key.as_str())
            .filter(|key| self.registry.is_shard_name(key));

        let stale = stale_intersection(local, remote_keys);
        info!(
            local = local.len(),
            remote = remote.len(),
            stale = stale.len(),
            bucket = %self.bucket,
            "Computed stale shards"
        );
        Ok(stale)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn delete_local(&self, options: DeletionOptions) -> Result<DeletionOutcome> {
        let stale = self.stale_local().await?;
        let candidates: Vec<String> = stale.iter().map(|s| s.file_name.clone()).collect();

        let question = format!(
            "Delete {} files from '{}'?",
            candidates.len(),
            self.registry.data_dir().display()
        );
        if let Some(outcome) = self.gate(&question, &candidates, options).await? {
            return Ok(outcome);
        }

        let timer = PhaseTimer::start(
            "delete_local",
            format!("Deleting {} local databases", candidates.len()),
        );

        let mut deleted = Vec::with_capacity(stale.len());
        for shard in &stale {
            match tokio::fs::remove_file(&shard.path).await {
                Ok(()) => deleted.push(shard.file_name.clone()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(file = %shard.file_name, "Already deleted");
                    deleted.push(shard.file_name.clone());
                }
                Err(e) => {
                    warn!(file = %shard.file_name, error = %e, "Failed to delete local shard");
                }
            }
        }

        timer.finish();
        Ok(DeletionOutcome::Deleted {
            requested: candidates.len(),
            deleted,
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn delete_remote(&self, options: DeletionOptions) -> Result<DeletionOutcome> {
        let candidates = self.stale_remote().await?;

        let question = format!(
            "Delete {} objects from bucket '{}'?",
            candidates.len(),
            self.bucket
        );
        if let Some(outcome) = self.gate(&question, &candidates, options).await? {
            return Ok(outcome);
        }

        let timer = PhaseTimer::start(
            "delete_remote",
            format!("Deleting {} remote databases", candidates.len()),
        );
        let deleted = self.gateway.delete(&self.bucket, &candidates).await?;
        timer.finish();

        Ok(DeletionOutcome::Deleted {
            requested: candidates.len(),
            deleted,
        })
    }

    /// `Some(outcome)` when deletion must not proceed.
    async fn gate(
        &self,
        question: &str,
        candidates: &[String],
        options: DeletionOptions,
    ) -> Result<Option<DeletionOutcome>> {
        if candidates.is_empty() {
            info!("No stale shards");
            return Ok(Some(DeletionOutcome::NothingToDelete));
        }

        info!(candidates = ?candidates, "Shards slated for deletion");

        if options.dry {
            info!(count = candidates.len(), "Dry run, not deleting");
            return Ok(Some(DeletionOutcome::DryRun {
                candidates: candidates.to_vec(),
            }));
        }

        if !options.skip_confirmation && !self.prompt.confirm(question).await? {
            info!("Deletion declined");
            return Ok(Some(DeletionOutcome::Declined {
                candidates: candidates.to_vec(),
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_intersection_requires_both_sides() {
        let local = vec![
            "spotify-data_1.db".to_string(),
            "spotify-data_2.db".to_string(),
            "spotify-data_3.db".to_string(),
        ];
        let remote = ["spotify-data_3.db", "spotify-data_1.db", "spotify-data_9.db"];

        assert_eq!(
            stale_intersection(&local, remote),
            vec!["spotify-data_1.db", "spotify-data_3.db"]
        );
        assert!(stale_intersection(&local, []).is_empty());
        assert!(stale_intersection(&[], remote).is_empty());
    }
}
