//! # Snapshot Collector
//!
//! One run per (rounded) timestamp:
//!
//! 1. Open or create the shard named for the timestamp. Shards carry no
//!    uniqueness constraint.
//! 2. Read this hour's slice of the artist-ID universe. The hour comes from
//!    the timestamp in the deployment's fixed UTC offset, so a re-run of the
//!    same timestamp reads the same slice on any host.
//! 3. Drop ids that already have a row for the timestamp in the shard.
//! 4. Request metrics in batches of at most `batch_size` ids, with
//!    `concurrency` batches in flight.
//! 5. Hand every successful batch to a [`BulkWriter`].
//!
//! A batch that keeps failing is retried with exponential backoff and, past
//! `random_pair_after` attempts, on a randomly chosen credential pair. Once
//! `max_attempts` calls have failed it yields no rows; the run itself keeps
//! going.

use crate::error::{Result, SyncError};
use bridge_traits::catalog::{ArtistMetric, CatalogClient, CredentialPair};
use bridge_traits::error::BridgeError;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use core_auth::CredentialRotator;
use core_library::db::{open_database, DatabaseConfig};
use core_library::schema::{create_snapshot_table, ids_at_timestamp};
use core_library::{ArtistIdSource, BulkWriter, ShardRegistry, SnapshotRow};
use core_runtime::config::{CollectorSettings, PipelineConfig};
use core_runtime::logging::PhaseTimer;
use futures::stream::{self, StreamExt};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Collection cadence. Run timestamps are rounded down to this interval.
pub const COLLECTION_INTERVAL_SECS: i64 = 15 * 60;

/// `timestamp` rounded down to a multiple of `interval_secs`.
pub fn round_down_to_interval(timestamp: i64, interval_secs: i64) -> i64 {
    if interval_secs <= 0 {
        return timestamp;
    }
    timestamp - timestamp.rem_euclid(interval_secs)
}

/// Hour of day (0-23) of `timestamp` in the given offset.
pub fn hour_of_day(timestamp: i64, offset: FixedOffset) -> u32 {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|instant| instant.with_timezone(&offset).hour())
        .unwrap_or(0)
}

/// Retry schedule for one request batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRetryPolicy {
    pub max_attempts: u32,
    pub random_pair_after: u32,
    pub backoff_base: u32,
    pub backoff_unit: Duration,
    pub max_backoff: Duration,
}

impl BatchRetryPolicy {
    pub fn from_settings(settings: &CollectorSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            random_pair_after: settings.random_pair_after,
            backoff_base: settings.backoff_base,
            backoff_unit: settings.backoff_unit,
            max_backoff: settings.max_backoff,
        }
    }

    /// Attempt indices start at 0.
    pub fn uses_random_pair(&self, attempt: u32) -> bool {
        attempt >= self.random_pair_after
    }

    /// Sleep after failed attempt `attempt`: `unit * base^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .checked_pow(attempt)
            .and_then(|factor| self.backoff_unit.checked_mul(factor))
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    /// Like [`delay_for`](Self::delay_for) but never shorter than a server
    /// supplied `Retry-After`, still capped at `max_backoff`.
    pub fn delay_after(&self, attempt: u32, error: &BridgeError) -> Duration {
        let computed = self.delay_for(attempt);
        match error {
            BridgeError::RateLimited {
                retry_after_seconds: Some(seconds),
            } => computed
                .max(Duration::from_secs(*seconds))
                .min(self.max_backoff),
            _ => computed,
        }
    }
}

/// Result of one request batch after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub metrics: Vec<ArtistMetric>,
    pub attempts: u32,
    /// `false` when every attempt failed and the batch was given up
    pub succeeded: bool,
}

/// Summary of one collector run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub timestamp: i64,
    pub hour: u32,
    pub shard: PathBuf,
    /// Position of this hour's slice in the universe
    pub slice: Range<u64>,
    pub skipped_existing: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub fetched: usize,
    pub inserted: u64,
}

pub struct SnapshotCollector {
    catalog: Arc<dyn CatalogClient>,
    rotator: CredentialRotator,
    registry: ShardRegistry,
    settings: CollectorSettings,
    utc_offset: FixedOffset,
}

impl SnapshotCollector {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        rotator: CredentialRotator,
        registry: ShardRegistry,
        settings: CollectorSettings,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            catalog,
            rotator,
            registry,
            settings,
            utc_offset,
        }
    }

    pub fn from_config(config: &PipelineConfig, catalog: Arc<dyn CatalogClient>) -> Self {
        Self::new(
            catalog,
            CredentialRotator::from_config(config),
            ShardRegistry::new(config.layout.clone()),
            config.collector.clone(),
            config.utc_offset,
        )
    }

    pub fn registry(&self) -> &ShardRegistry {
        &self.registry
    }

    pub fn retry_policy(&self) -> BatchRetryPolicy {
        BatchRetryPolicy::from_settings(&self.settings)
    }

    /// Collect for `timestamp`, reading the universe from the configured
    /// artist-ID database.
    pub async fn collect_from_file(&self, timestamp: i64) -> Result<CollectionReport> {
        let artist_ids = ArtistIdSource::open(self.registry.layout().artist_ids_path()).await?;
        let result = self.collect(timestamp, &artist_ids).await;
        artist_ids.close().await;
        result
    }

    #[instrument(skip(self, artist_ids))]
    pub async fn collect(
        &self,
        timestamp: i64,
        artist_ids: &ArtistIdSource,
    ) -> Result<CollectionReport> {
        self.rotator.validate()?;

        let hour = hour_of_day(timestamp, self.utc_offset);
        let shard = self.registry.path_for(timestamp);

        let pool = open_database(DatabaseConfig::new(&shard).create_if_missing(true)).await?;
        create_snapshot_table(&pool, false).await?;

        let (slice, ids) = artist_ids.ids_for_hour(hour).await?;
        let existing = ids_at_timestamp(&pool, timestamp).await?;
        let selected = ids.len();
        let pending: Vec<String> = ids
            .into_iter()
            .filter(|id| !existing.contains(id))
            .collect();
        let skipped_existing = selected - pending.len();

        let batch_size = self
            .settings
            .batch_size
            .min(self.catalog.max_ids_per_request())
            .max(1);
        let batches: Vec<&[String]> = pending.chunks(batch_size).collect();

        info!(
            hour,
            start = slice.start,
            end = slice.end,
            pending = pending.len(),
            skipped_existing,
            batches = batches.len(),
            shard = %shard.display(),
            "Collecting snapshots"
        );
        let timer = PhaseTimer::start(
            "collect",
            format!("Retrieving snapshots for {} artists", pending.len()),
        );

        let mut writer = BulkWriter::new(pool.clone(), self.settings.flush_threshold);
        let mut outcomes = stream::iter(batches.iter().copied())
            .map(|batch| self.fetch_batch(hour, batch))
            .buffer_unordered(self.settings.concurrency.max(1));

        let mut failed_batches = 0;
        let mut fetched = 0;
        let write_result: Result<u64> = async {
            while let Some(outcome) = outcomes.next().await {
                let outcome = outcome?;
                if !outcome.succeeded {
                    failed_batches += 1;
                    continue;
                }
                fetched += outcome.metrics.len();
                writer.extend(
                    outcome
                        .metrics
                        .into_iter()
                        .map(|metric| SnapshotRow::from_metric(metric, timestamp)),
                );
                writer.flush_if_needed().await?;
            }
            writer.flush().await?;
            Ok(writer.inserted())
        }
        .await;
        drop(outcomes);
        pool.close().await;
        let inserted = write_result?;

        if failed_batches > 0 {
            warn!(failed_batches, "Some batches yielded no rows");
        }
        info!(fetched, inserted, shard = %shard.display(), "Inserted snapshots");
        timer.finish();

        Ok(CollectionReport {
            timestamp,
            hour,
            shard,
            slice,
            skipped_existing,
            batches: batches.len(),
            failed_batches,
            fetched,
            inserted,
        })
    }

    /// Fetch one batch, retrying until it succeeds or attempts run out.
    ///
    /// Only a credential configuration problem is returned as an error; every
    /// catalog failure is absorbed into an unsuccessful [`BatchOutcome`].
    pub async fn fetch_batch(&self, hour: u32, ids: &[String]) -> Result<BatchOutcome> {
        let policy = self.retry_policy();
        let mut attempt = 0;

        loop {
            let pair = self.pair_for_attempt(&policy, hour, attempt)?;

            let error = match self.catalog.get_artists(&pair, ids).await {
                Ok(metrics) => {
                    if attempt > 0 {
                        debug!(attempt, ids = ids.len(), "Batch succeeded after retry");
                    }
                    return Ok(BatchOutcome {
                        metrics,
                        attempts: attempt + 1,
                        succeeded: true,
                    });
                }
                Err(error) => error,
            };

            if attempt + 1 >= policy.max_attempts {
                warn!(
                    attempts = attempt + 1,
                    ids = ids.len(),
                    first_id = ids.first().map(String::as_str).unwrap_or_default(),
                    error = %error,
                    "Giving up on batch"
                );
                return Ok(BatchOutcome {
                    metrics: Vec::new(),
                    attempts: attempt + 1,
                    succeeded: false,
                });
            }

            let delay = policy.delay_after(attempt, &error);
            if error.is_rate_limited() {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Rate limited, backing off");
            } else {
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "Batch request failed");
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn pair_for_attempt(
        &self,
        policy: &BatchRetryPolicy,
        hour: u32,
        attempt: u32,
    ) -> Result<CredentialPair> {
        let pair = if policy.uses_random_pair(attempt) {
            self.rotator.random_pair()
        } else {
            self.rotator.pair_for_hour(hour)
        };
        pair.map_err(SyncError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use core_runtime::config::StorageLayout;
    use mockall::{mock, Sequence};

    mock! {
        Catalog {}

        #[async_trait]
        impl CatalogClient for Catalog {
            fn max_ids_per_request(&self) -> usize;
            async fn get_artists(&self, credentials: &CredentialPair, ids: &[String]) -> BridgeResult<Vec<ArtistMetric>>;
        }
    }

    fn collector_with(catalog: MockCatalog, max_attempts: u32) -> SnapshotCollector {
        let settings = CollectorSettings {
            max_attempts,
            random_pair_after: 10,
            backoff_unit: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..CollectorSettings::default()
        };
        SnapshotCollector::new(
            Arc::new(catalog),
            CredentialRotator::new(vec![
                CredentialPair::new("morning", "s1"),
                CredentialPair::new("evening", "s2"),
            ]),
            ShardRegistry::new(StorageLayout::default()),
            settings,
            FixedOffset::east_opt(0).unwrap(),
        )
    }

    fn ids() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn policy() -> BatchRetryPolicy {
        BatchRetryPolicy {
            max_attempts: 20,
            random_pair_after: 5,
            backoff_base: 2,
            backoff_unit: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_round_down_to_interval() {
        assert_eq!(round_down_to_interval(1_700_000_123, COLLECTION_INTERVAL_SECS), 1_700_000_100);
        assert_eq!(round_down_to_interval(900, 900), 900);
        assert_eq!(round_down_to_interval(899, 900), 0);
        assert_eq!(round_down_to_interval(-1, 900), -900);
        assert_eq!(round_down_to_interval(42, 0), 42);
    }

    #[test]
    fn test_hour_of_day_uses_offset() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();

        // 2023-11-14T22:13:20Z
        assert_eq!(hour_of_day(1_700_000_000, utc), 22);
        assert_eq!(hour_of_day(1_700_000_000, new_york), 17);
        assert_eq!(hour_of_day(3 * 3600, new_york), 22);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = policy();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(6), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_extends_delay() {
        let policy = policy();
        let limited = BridgeError::RateLimited {
            retry_after_seconds: Some(10),
        };
        assert_eq!(policy.delay_after(0, &limited), Duration::from_secs(10));
        assert_eq!(policy.delay_after(5, &limited), Duration::from_secs(32));

        let huge = BridgeError::RateLimited {
            retry_after_seconds: Some(3600),
        };
        assert_eq!(policy.delay_after(0, &huge), Duration::from_secs(60));
    }

    #[test]
    fn test_random_pair_threshold() {
        let policy = policy();
        assert!(!policy.uses_random_pair(0));
        assert!(!policy.uses_random_pair(4));
        assert!(policy.uses_random_pair(5));
        assert!(policy.uses_random_pair(19));
    }

    #[tokio::test]
    async fn test_fetch_batch_retries_then_succeeds() {
        let mut catalog = MockCatalog::new();
        let mut seq = Sequence::new();
        catalog
            .expect_get_artists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(BridgeError::OperationFailed("502".to_string())));
        catalog
            .expect_get_artists()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|pair, ids| pair.client_id == "evening" && ids.len() == 2)
            .returning(|_, ids| {
                Ok(ids
                    .iter()
                    .map(|id| ArtistMetric {
                        id: id.clone(),
                        followers: 1,
                        popularity: 2,
                    })
                    .collect())
            });

        let outcome = collector_with(catalog, 3).fetch_batch(13, &ids()).await.unwrap();

        assert!(outcome.succeeded);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.metrics.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_batch_gives_up_after_max_attempts() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_artists()
            .times(3)
            .returning(|_, _| {
                Err(BridgeError::RateLimited {
                    retry_after_seconds: None,
                })
            });

        let outcome = collector_with(catalog, 3).fetch_batch(0, &ids()).await.unwrap();

        assert!(!outcome.succeeded);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.metrics.is_empty());
    }
}
