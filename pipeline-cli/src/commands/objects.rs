use crate::context::AppContext;
use anyhow::Result;
use bridge_traits::object_store::ObjectSummary;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::logging::bytes_to_mb;
use core_sync::ShardTransfers;
use std::path::Path;
use tracing::info;

/// Markdown table of `Key | LastModified | Size`.
pub fn render_table(objects: &[ObjectSummary]) -> String {
    let mut lines = vec![
        "| Key | LastModified | Size |".to_string(),
        "| -- | -- | -- |".to_string(),
    ];
    lines.extend(objects.iter().map(|object| {
        let modified = object
            .last_modified
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        format!("| {} | {} | {} |", object.key, modified, bytes_to_mb(object.size))
    }));
    lines.join("\n")
}

pub async fn run_list(ctx: &AppContext, bucket: Option<String>, prefix: Option<String>) -> Result<()> {
    let bucket = ctx.bucket_or_default(bucket);
    let objects = ctx.gateway().await.list(&bucket, prefix.as_deref()).await?;
    println!("{}", render_table(&objects));
    Ok(())
}

pub async fn run_upload(
    ctx: &AppContext,
    filename: &Path,
    bucket: Option<String>,
    key: Option<String>,
) -> Result<()> {
    let bucket = ctx.bucket_or_default(bucket);
    let path = ctx.data_path(filename);
    let gateway = ctx.gateway().await;
    match key {
        Some(key) => {
            gateway.upload(&bucket, &key, &path).await?;
        }
        None => {
            let transfers = ShardTransfers::from_config(&ctx.config, gateway);
            transfers.upload_file(&bucket, &path).await?;
        }
    }
    Ok(())
}

pub async fn run_download(ctx: &AppContext, bucket: Option<String>, key: &str) -> Result<()> {
    let bucket = ctx.bucket_or_default(bucket);
    let path = ctx
        .gateway()
        .await
        .download(&bucket, key, &ctx.config.layout.data_dir)
        .await?;
    info!(path = %path.display(), "Downloaded object");
    Ok(())
}

pub async fn run_download_shards(ctx: &AppContext) -> Result<()> {
    let transfers = ShardTransfers::from_config(&ctx.config, ctx.gateway().await);
    let report = transfers.download_missing_shards().await?;
    info!(
        remote = report.remote,
        already_local = report.already_local,
        downloaded = report.downloaded.len(),
        "Shard download finished"
    );
    Ok(())
}

pub async fn run_copy(
    ctx: &AppContext,
    source_bucket: Option<String>,
    source_key: &str,
    target_bucket: Option<String>,
    target_key: Option<String>,
) -> Result<()> {
    let source_bucket = ctx.bucket_or_default(source_bucket);
    let target_bucket = ctx.bucket_or_default(target_bucket);
    let target_key = target_key.unwrap_or_else(|| source_key.to_string());

    ctx.gateway()
        .await
        .copy(&source_bucket, source_key, &target_bucket, &target_key)
        .await?;
    Ok(())
}

pub async fn run_backup(ctx: &AppContext, key: Option<String>) -> Result<()> {
    let transfers = ShardTransfers::from_config(&ctx.config, ctx.gateway().await);
    let report = transfers
        .backup_canonical(key.as_deref(), SystemClock.unix_timestamp())
        .await?;
    info!(bucket = %report.bucket, key = %report.key, "Backup stored");
    Ok(())
}
