//! The artist-ID universe: every artist id the collector polls, stored in
//! `artist_ids.db` and read in stable `rowid` order.

use crate::db::{open_database, DatabaseConfig};
use crate::Result;
use sqlx::SqlitePool;
use std::ops::Range;
use std::path::Path;

pub const ARTIST_ID_TABLE: &str = "artist_ids";

/// Number of hourly slices the universe is divided into.
pub const HOURS_PER_DAY: u32 = 24;

/// Rows of the universe assigned to `hour` (0-23).
///
/// Each hour gets `total / 24` rows; hour 23 also takes the remainder so the
/// slices cover the whole universe. Hours above 23 are treated as 23.
pub fn hour_range(total: u64, hour: u32) -> Range<u64> {
    let hour = hour.min(HOURS_PER_DAY - 1) as u64;
    let slice = total / HOURS_PER_DAY as u64;
    let start = hour * slice;
    let end = if hour == (HOURS_PER_DAY - 1) as u64 {
        total
    } else {
        start + slice
    };
    start..end
}

/// Read access to the artist-ID universe.
#[derive(Debug, Clone)]
pub struct ArtistIdSource {
    pool: SqlitePool,
}

impl ArtistIdSource {
    /// Open the universe file read-only. A missing file is
    /// [`LibraryError::MissingFile`](crate::LibraryError::MissingFile).
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = open_database(DatabaseConfig::new(path.as_ref()).read_only(true)).await?;
        Ok(Self { pool })
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", ARTIST_ID_TABLE))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    pub async fn slice(&self, range: Range<u64>) -> Result<Vec<String>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let ids = sqlx::query_scalar(&format!(
            "SELECT id FROM {} ORDER BY rowid LIMIT ? OFFSET ?",
            ARTIST_ID_TABLE
        ))
        .bind((range.end - range.start) as i64)
        .bind(range.start as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Ids assigned to `hour`, together with their position in the universe.
    pub async fn ids_for_hour(&self, hour: u32) -> Result<(Range<u64>, Vec<String>)> {
        let range = hour_range(self.count().await?, hour);
        let ids = self.slice(range.clone()).await?;
        Ok((range, ids))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
