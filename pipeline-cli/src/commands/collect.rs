use crate::context::AppContext;
use anyhow::Result;
use bridge_traits::time::{Clock, SystemClock};
use core_sync::{
    round_down_to_interval, MergeEngine, MergeOptions, ScheduleOptions, Scheduler,
    ShardTransfers, SnapshotCollector, COLLECTION_INTERVAL_SECS,
};
use std::sync::Arc;
use tracing::info;

pub async fn run_sync(ctx: &AppContext, timestamp: Option<i64>, upload: bool) -> Result<()> {
    let collector = SnapshotCollector::from_config(&ctx.config, ctx.catalog()?);
    let timestamp = timestamp.unwrap_or_else(|| {
        round_down_to_interval(SystemClock.unix_timestamp(), COLLECTION_INTERVAL_SECS)
    });

    let report = collector.collect_from_file(timestamp).await?;
    info!(
        shard = %report.shard.display(),
        hour = report.hour,
        inserted = report.inserted,
        failed_batches = report.failed_batches,
        "Sync finished"
    );

    if upload {
        let transfers = ShardTransfers::from_config(&ctx.config, ctx.gateway().await);
        transfers.upload_shard(&report.shard).await?;
    }
    Ok(())
}

pub async fn run_schedule(
    ctx: &AppContext,
    interval_secs: i64,
    merge_every: Option<u64>,
    upload_shards: bool,
    max_cycles: Option<u64>,
    merge: MergeOptions,
) -> Result<()> {
    let collector = SnapshotCollector::from_config(&ctx.config, ctx.catalog()?);
    let options = ScheduleOptions {
        interval_secs,
        merge_every,
        merge,
        upload_shards,
        max_cycles,
    };

    let mut scheduler = Scheduler::new(collector, Arc::new(SystemClock), options);
    if merge_every.is_some() {
        scheduler = scheduler.with_merge(MergeEngine::from_config(&ctx.config));
    }
    if upload_shards || merge_every.is_some() {
        scheduler = scheduler.with_transfers(ShardTransfers::from_config(
            &ctx.config,
            ctx.gateway().await,
        ));
    }

    let cycles = scheduler.run().await?;
    info!(cycles, "Scheduler stopped");
    Ok(())
}
