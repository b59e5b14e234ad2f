use crate::context::AppContext;
use anyhow::Result;
use core_library::{create_sample, SampleOptions};
use core_sync::{create_indexes_on, MergeEngine, MergeOptions, ShardTransfers};
use std::path::Path;
use tracing::info;

pub async fn run_merge(ctx: &AppContext, options: MergeOptions, upload: bool) -> Result<()> {
    let engine = MergeEngine::from_config(&ctx.config);
    let report = engine.merge(&options).await?;

    if upload {
        let transfers = ShardTransfers::from_config(&ctx.config, ctx.gateway().await);
        transfers.upload_canonical(&report.target).await?;
    }
    Ok(())
}

pub async fn run_create_indexes(ctx: &AppContext, filename: &Path) -> Result<()> {
    create_indexes_on(&ctx.data_path(filename)).await?;
    Ok(())
}

pub async fn run_create_sample(
    ctx: &AppContext,
    input: &Path,
    output: &Path,
    ids: Vec<String>,
    skip_indexes: bool,
) -> Result<()> {
    let rows = create_sample(
        &ctx.data_path(input),
        &ctx.data_path(output),
        &SampleOptions { ids, skip_indexes },
    )
    .await?;
    info!(rows, output = %output.display(), "Sample database written");
    Ok(())
}
