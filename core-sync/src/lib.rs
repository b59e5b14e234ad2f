//! # Collection & Consolidation
//!
//! The pipeline stages built on top of the storage and database layers.
//!
//! ## Components
//!
//! - **Snapshot Collector** (`collector`): fetches one hour's slice of the
//!   artist universe into a timestamped shard, with backoff and credential
//!   rotation per batch
//! - **Merge Engine** (`merge`): folds local shards into the canonical
//!   database, copying a large checkpoint shard forward as the base
//! - **Retention** (`retention`): deletes shards present both locally and
//!   remotely, behind a confirmation gate
//! - **Shard Transfers** (`transfer`): downloads missing shards, uploads new
//!   ones, backs up the canonical file
//! - **Scheduler** (`scheduler`): runs the above on a fixed cadence

pub mod collector;
pub mod error;
pub mod merge;
pub mod retention;
pub mod scheduler;
pub mod transfer;

pub use collector::{
    hour_of_day, round_down_to_interval, BatchOutcome, BatchRetryPolicy, CollectionReport,
    SnapshotCollector, COLLECTION_INTERVAL_SECS,
};
pub use error::{Result, SyncError};
pub use merge::{create_indexes_on, MergeEngine, MergeOptions, MergeReport};
pub use retention::{stale_intersection, DeletionOptions, DeletionOutcome, Retention};
pub use scheduler::{ScheduleOptions, Scheduler};
pub use transfer::{ShardDownloadReport, ShardTransfers};
