//! # Database Access Module
//!
//! Opens single-file SQLite databases (shards, the canonical file, the
//! artist-ID universe) through sqlx.
//!
//! ## Features
//!
//! - **One connection per file**: every pool holds exactly one long-lived
//!   connection, so connection-scoped pragmas stay in effect and a file is
//!   never written from two connections at once
//! - **Rollback journal**: `DELETE` journal mode keeps each database a single
//!   self-contained file that can be copied or uploaded as-is
//! - **Bulk-load mode**: [`apply_bulk_load_pragmas`] trades durability for
//!   write throughput while a merge is running
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_library::db::{DatabaseConfig, open_database};
//!
//! let pool = open_database(DatabaseConfig::new("spotify-data_1700000000.db").create_if_missing(true)).await?;
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How to open one database file
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,

    /// Create the file when it does not exist. Otherwise a missing file is a
    /// [`LibraryError::MissingFile`].
    pub create_if_missing: bool,

    /// Open without write access (merge sources)
    pub read_only: bool,

    /// How long to wait on a lock held by another process
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: false,
            read_only: false,
            busy_timeout: Duration::from_secs(30),
        }
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Open a database file and return a single-connection pool.
///
/// # Errors
///
/// - [`LibraryError::MissingFile`] when the file is absent and
///   `create_if_missing` is off
/// - [`LibraryError::Database`] when SQLite refuses the file
pub async fn open_database(config: DatabaseConfig) -> Result<SqlitePool> {
    if !config.create_if_missing && !tokio::fs::try_exists(&config.path).await? {
        return Err(LibraryError::missing_file(&config.path));
    }

    debug!(
        path = %config.path.display(),
        create_if_missing = config.create_if_missing,
        read_only = config.read_only,
        "Opening database"
    );

    let connect_options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(config.create_if_missing)
        .read_only(config.read_only)
        .journal_mode(SqliteJournalMode::Delete)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(path = %config.path.display(), error = %e, "Failed to open database");
            LibraryError::Database(e)
        })?;

    Ok(pool)
}

/// Switch an open database into bulk-load mode for the rest of the
/// connection's life: no fsync, no rollback journal, exclusive lock.
///
/// A crash while in this mode can corrupt the file; callers must treat the
/// database as disposable until they close it cleanly.
pub async fn apply_bulk_load_pragmas(pool: &SqlitePool) -> Result<()> {
    for pragma in [
        "PRAGMA synchronous = OFF",
        "PRAGMA locking_mode = EXCLUSIVE",
        "PRAGMA journal_mode = OFF",
    ] {
        sqlx::query(pragma).execute(pool).await?;
    }

    info!("Bulk-load pragmas applied");
    Ok(())
}

/// Rebuild the database file to reclaim free pages.
pub async fn vacuum(pool: &SqlitePool) -> Result<()> {
    sqlx::query("VACUUM").execute(pool).await?;
    Ok(())
}
