//! # Core Library
//!
//! Storage layer for artist snapshots. Every database is a single SQLite
//! file:
//!
//! - hourly **shards** written by the collector (`spotify-data_<ts>.db`)
//! - the **canonical** merged file (`merged-spotify-data.db`)
//! - the artist-ID **universe** (`artist_ids.db`)
//!
//! ## Modules
//!
//! - [`db`]: opening files, bulk-load pragmas
//! - [`schema`]: table creation, constraint migration, indexes, dedupe
//! - [`bulk_writer`]: buffered transactional inserts
//! - [`pagination`]: restartable page cursor
//! - [`shards`]: shard naming, discovery, checkpoint selection
//! - [`artist_ids`]: hourly slices of the universe
//! - [`sample`]: per-artist sample extraction

pub mod artist_ids;
pub mod bulk_writer;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod sample;
pub mod schema;
pub mod shards;

pub use artist_ids::{hour_range, ArtistIdSource};
pub use bulk_writer::BulkWriter;
pub use db::{apply_bulk_load_pragmas, open_database, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::SnapshotRow;
pub use pagination::{Page, PageCursor, PageRequest};
pub use sample::{create_sample, SampleOptions, MAX_SAMPLE_IDS};
pub use shards::{find_checkpoint, ShardFile, ShardRegistry};
