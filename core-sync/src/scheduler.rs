//! # Scheduler
//!
//! Runs the collector on a fixed cadence and, optionally, a merge plus upload
//! every few collections. Jobs are awaited one after another, so two runs
//! never overlap.

use crate::collector::{round_down_to_interval, SnapshotCollector, COLLECTION_INTERVAL_SECS};
use crate::error::Result;
use crate::merge::{MergeEngine, MergeOptions};
use crate::transfer::ShardTransfers;
use bridge_traits::time::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOptions {
    pub interval_secs: i64,
    /// Merge after every `n` collections; `None` disables merging
    pub merge_every: Option<u64>,
    pub merge: MergeOptions,
    /// Upload each new shard once collected
    pub upload_shards: bool,
    /// Stop after this many collections; `None` runs forever
    pub max_cycles: Option<u64>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            interval_secs: COLLECTION_INTERVAL_SECS,
            merge_every: None,
            merge: MergeOptions::default(),
            upload_shards: false,
            max_cycles: None,
        }
    }
}

/// Seconds from `now` until the next interval boundary.
pub fn seconds_until_next_tick(now: i64, interval_secs: i64) -> i64 {
    if interval_secs <= 0 {
        return 0;
    }
    round_down_to_interval(now, interval_secs) + interval_secs - now
}

pub struct Scheduler {
    collector: SnapshotCollector,
    clock: Arc<dyn Clock>,
    options: ScheduleOptions,
    merge: Option<MergeEngine>,
    transfers: Option<ShardTransfers>,
}

impl Scheduler {
    pub fn new(collector: SnapshotCollector, clock: Arc<dyn Clock>, options: ScheduleOptions) -> Self {
        Self {
            collector,
            clock,
            options,
            merge: None,
            transfers: None,
        }
    }

    pub fn with_merge(mut self, engine: MergeEngine) -> Self {
        self.merge = Some(engine);
        self
    }

    pub fn with_transfers(mut self, transfers: ShardTransfers) -> Self {
        self.transfers = Some(transfers);
        self
    }

    /// Run until `max_cycles` collections have completed.
    ///
    /// A failed cycle is logged and the schedule continues, unless the
    /// failure is a missing input or bad configuration.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<u64> {
        let mut cycles = 0u64;

        loop {
            let now = self.clock.unix_timestamp();
            let timestamp = round_down_to_interval(now, self.options.interval_secs);

            if let Err(e) = self.run_cycle(timestamp, cycles + 1).await {
                if e.is_precondition() {
                    error!(error = %e, "Scheduled run cannot proceed");
                    return Err(e);
                }
                error!(error = %e, timestamp, "Scheduled run failed");
            }
            cycles += 1;

            if self.options.max_cycles.is_some_and(|max| cycles >= max) {
                info!(cycles, "Schedule finished");
                return Ok(cycles);
            }

            let wait = seconds_until_next_tick(self.clock.unix_timestamp(), self.options.interval_secs);
            info!(wait_secs = wait, "Waiting for next run");
            tokio::time::sleep(Duration::from_secs(wait.max(0) as u64)).await;
        }
    }

    /// One collection, then the follow-up jobs due at `cycle` (1-based).
    pub async fn run_cycle(&self, timestamp: i64, cycle: u64) -> Result<()> {
        let report = self.collector.collect_from_file(timestamp).await?;

        if let (true, Some(transfers)) = (self.options.upload_shards, &self.transfers) {
            transfers.upload_shard(&report.shard).await?;
        }

        let merge_due = self
            .options
            .merge_every
            .is_some_and(|every| every > 0 && cycle % every == 0);
        if !merge_due {
            return Ok(());
        }

        let Some(engine) = &self.merge else {
            warn!("Merge is due but no merge engine is configured");
            return Ok(());
        };
        let merged = engine.merge(&self.options.merge).await?;

        if let Some(transfers) = &self.transfers {
            transfers.upload_canonical(&merged.target).await?;
        }
        Ok(())
    }
}
