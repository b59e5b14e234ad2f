mod cli;
mod commands {
    pub mod collect;
    pub mod merge;
    pub mod objects;
    pub mod retention;
}
mod context;

use clap::Parser;
use cli::{Cli, Command};
use context::AppContext;
use core_library::LibraryError;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_storage::StorageError;
use core_sync::SyncError;
use std::process::ExitCode;
use tracing::error;

/// Missing inputs and bad configuration exit with 1, everything else with 2.
fn exit_code(err: &anyhow::Error) -> u8 {
    let precondition = err.chain().any(|cause| {
        cause
            .downcast_ref::<SyncError>()
            .is_some_and(SyncError::is_precondition)
            || matches!(
                cause.downcast_ref::<StorageError>(),
                Some(StorageError::MissingFile { .. })
            )
            || matches!(
                cause.downcast_ref::<LibraryError>(),
                Some(LibraryError::MissingFile { .. })
            )
            || cause
                .downcast_ref::<core_runtime::Error>()
                .is_some_and(core_runtime::Error::is_config)
    });
    if precondition {
        1
    } else {
        2
    }
}

async fn run(cmd: Command) -> anyhow::Result<()> {
    let ctx = AppContext::from_env()?;

    match cmd {
        Command::Sync { timestamp, upload } => {
            commands::collect::run_sync(&ctx, timestamp, upload).await
        }
        Command::Schedule {
            interval_secs,
            merge_every,
            upload_shards,
            max_cycles,
            merge,
        } => {
            commands::collect::run_schedule(
                &ctx,
                interval_secs,
                merge_every,
                upload_shards,
                max_cycles,
                merge.into(),
            )
            .await
        }
        Command::Merge { merge, upload } => {
            commands::merge::run_merge(&ctx, merge.into(), upload).await
        }
        Command::CreateIndexes { filename } => {
            commands::merge::run_create_indexes(&ctx, &filename).await
        }
        Command::CreateSample {
            input_filename,
            output_filename,
            ids,
            skip_indexes,
        } => {
            commands::merge::run_create_sample(
                &ctx,
                &input_filename,
                &output_filename,
                ids,
                skip_indexes,
            )
            .await
        }
        Command::ListObjects { bucket, prefix } => {
            commands::objects::run_list(&ctx, bucket, prefix).await
        }
        Command::UploadObject {
            filename,
            bucket,
            key,
        } => commands::objects::run_upload(&ctx, &filename, bucket, key).await,
        Command::DownloadObject { bucket, key } => {
            commands::objects::run_download(&ctx, bucket, &key).await
        }
        Command::DownloadShards => commands::objects::run_download_shards(&ctx).await,
        Command::CopyObject {
            source_bucket,
            source_key,
            target_bucket,
            target_key,
        } => {
            commands::objects::run_copy(&ctx, source_bucket, &source_key, target_bucket, target_key)
                .await
        }
        Command::DeleteLocalShards { deletion } => {
            commands::retention::run_delete_local(&ctx, deletion.into()).await
        }
        Command::DeleteRemoteShards { deletion } => {
            commands::retention::run_delete_remote(&ctx, deletion.into()).await
        }
        Command::BackupMerged { key } => commands::objects::run_backup(&ctx, key).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .with_format(cli.log_format.into())
        .with_level(cli.log_level);
    if let Err(e) = init_logging(logging) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::from(2);
    }

    match run(cli.cmd).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{:#}", err), "Command failed");
            ExitCode::from(exit_code(&err))
        }
    }
}
