use bridge_traits::time::LogLevel;
use clap::{Args, Parser, Subcommand, ValueEnum};
use core_runtime::logging::LogFormat;
use core_sync::{DeletionOptions, MergeOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapshot-pipeline")]
#[command(about = "Collects artist metric snapshots and consolidates them into one database")]
pub struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty, env = "LOG_FORMAT")]
    pub log_format: LogFormatArg,
    #[arg(long, global = true, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Collect one snapshot run into its shard
    Sync {
        /// Run timestamp in seconds; defaults to now, rounded to the collection interval
        #[arg(long)]
        timestamp: Option<i64>,
        /// Upload the shard once collected
        #[arg(long)]
        upload: bool,
    },
    /// Collect every interval until stopped
    Schedule {
        #[arg(long, default_value_t = core_sync::COLLECTION_INTERVAL_SECS)]
        interval_secs: i64,
        /// Merge and upload the canonical database after every N collections
        #[arg(long)]
        merge_every: Option<u64>,
        #[arg(long)]
        upload_shards: bool,
        #[arg(long)]
        max_cycles: Option<u64>,
        #[command(flatten)]
        merge: MergeArgs,
    },
    /// Merge local shards into the canonical database
    Merge {
        #[command(flatten)]
        merge: MergeArgs,
        /// Upload the result to the snapshots bucket
        #[arg(long)]
        upload: bool,
    },
    CreateIndexes {
        #[arg(long)]
        filename: PathBuf,
    },
    /// Copy every snapshot of a few artists into a small database
    CreateSample {
        #[arg(long)]
        input_filename: PathBuf,
        #[arg(long, default_value = "sample.db")]
        output_filename: PathBuf,
        #[arg(long = "id", required = true, num_args = 1..)]
        ids: Vec<String>,
        #[arg(long)]
        skip_indexes: bool,
    },
    ListObjects {
        #[arg(long)]
        bucket: Option<String>,
        #[arg(long)]
        prefix: Option<String>,
    },
    UploadObject {
        #[arg(long)]
        filename: PathBuf,
        #[arg(long)]
        bucket: Option<String>,
        /// Defaults to the file name
        #[arg(long)]
        key: Option<String>,
    },
    DownloadObject {
        #[arg(long)]
        bucket: Option<String>,
        #[arg(long)]
        key: String,
    },
    /// Download every remote shard missing locally
    DownloadShards,
    CopyObject {
        #[arg(long)]
        source_bucket: Option<String>,
        #[arg(long)]
        source_key: String,
        #[arg(long)]
        target_bucket: Option<String>,
        /// Defaults to the source key
        #[arg(long)]
        target_key: Option<String>,
    },
    /// Delete local shards that are already stored remotely
    DeleteLocalShards {
        #[command(flatten)]
        deletion: DeletionArgs,
    },
    /// Delete remote shards that are also present locally
    DeleteRemoteShards {
        #[command(flatten)]
        deletion: DeletionArgs,
    },
    /// Copy the canonical database into the backups bucket
    BackupMerged {
        #[arg(long)]
        key: Option<String>,
    },
}

#[derive(Args, Clone)]
pub struct MergeArgs {
    /// Start from an empty database instead of the largest shard
    #[arg(long)]
    pub skip_checkpoint_as_base: bool,
    #[arg(long)]
    pub skip_indexes: bool,
    /// Target file, relative to the data directory
    #[arg(long)]
    pub filename: Option<PathBuf>,
    /// Name the target after the earliest and latest shard timestamps
    #[arg(long)]
    pub use_range_filename: bool,
}

impl From<MergeArgs> for MergeOptions {
    fn from(args: MergeArgs) -> Self {
        MergeOptions {
            skip_checkpoint_as_base: args.skip_checkpoint_as_base,
            skip_indexes: args.skip_indexes,
            target: args.filename,
            use_range_filename: args.use_range_filename,
        }
    }
}

#[derive(Args, Clone, Copy)]
pub struct DeletionArgs {
    /// Only list what would be deleted
    #[arg(long)]
    pub dry: bool,
    #[arg(long)]
    pub skip_confirmation: bool,
}

impl From<DeletionArgs> for DeletionOptions {
    fn from(args: DeletionArgs) -> Self {
        DeletionOptions {
            dry: args.dry,
            skip_confirmation: args.skip_confirmation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_merge_flags() {
        let cli = Cli::try_parse_from([
            "snapshot-pipeline",
            "merge",
            "--skip-indexes",
            "--use-range-filename",
        ])
        .unwrap();

        match cli.cmd {
            Command::Merge { merge, upload } => {
                let options = MergeOptions::from(merge);
                assert!(options.skip_indexes);
                assert!(options.use_range_filename);
                assert!(!options.skip_checkpoint_as_base);
                assert!(!upload);
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn test_create_sample_requires_ids() {
        assert!(Cli::try_parse_from([
            "snapshot-pipeline",
            "create-sample",
            "--input-filename",
            "merged.db",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "snapshot-pipeline",
            "create-sample",
            "--input-filename",
            "merged.db",
            "--id",
            "a",
            "b",
        ])
        .unwrap();
        match cli.cmd {
            Command::CreateSample {
                ids,
                output_filename,
                ..
            } => {
                assert_eq!(ids, vec!["a", "b"]);
                assert_eq!(output_filename, PathBuf::from("sample.db"));
            }
            _ => panic!("expected create-sample"),
        }
    }
}
