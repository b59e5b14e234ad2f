//! Buffered, transactional inserts into `artist_snapshots`.

use crate::models::SnapshotRow;
use crate::schema::SNAPSHOT_TABLE;
use crate::Result;
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Accumulates rows in memory and commits them in one transaction per flush.
///
/// Inserts use `INSERT OR IGNORE`, so a row rejected by a UNIQUE constraint
/// is skipped without failing the batch. If the transaction fails the buffer
/// is kept intact and the flush can be retried.
pub struct BulkWriter {
    pool: SqlitePool,
    buffer: Vec<SnapshotRow>,
    threshold: usize,
    inserted: u64,
    flushes: u64,
}

impl BulkWriter {
    pub fn new(pool: SqlitePool, threshold: usize) -> Self {
        Self {
            pool,
            buffer: Vec::new(),
            threshold: threshold.max(1),
            inserted: 0,
            flushes: 0,
        }
    }

    pub fn push(&mut self, row: SnapshotRow) {
        self.buffer.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = SnapshotRow>) {
        self.buffer.extend(rows);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Rows actually inserted across all successful flushes.
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Flush when the buffer has reached the threshold.
    ///
    /// Returns whether a flush happened.
    pub async fn flush_if_needed(&mut self) -> Result<bool> {
        if self.buffer.len() < self.threshold {
            return Ok(false);
        }
        self.flush().await?;
        Ok(true)
    }

    /// Write every buffered row in a single transaction and clear the buffer.
    ///
    /// Returns the number of rows inserted by this flush.
    pub async fn flush(&mut self) -> Result<u64> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let inserted = match write_batch(&self.pool, &self.buffer).await {
            Ok(inserted) => inserted,
            Err(e) => {
                warn!(buffered = self.buffer.len(), error = %e, "Bulk insert rolled back");
                return Err(e);
            }
        };

        debug!(
            rows = self.buffer.len(),
            inserted,
            ignored = self.buffer.len() as u64 - inserted,
            "Flushed snapshot rows"
        );

        self.buffer.clear();
        self.inserted += inserted;
        self.flushes += 1;
        Ok(inserted)
    }
}

async fn write_batch(pool: &SqlitePool, rows: &[SnapshotRow]) -> Result<u64> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} (id, timestamp, followers, popularity) VALUES (?, ?, ?, ?)",
        SNAPSHOT_TABLE
    );

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;
    for row in rows {
        let result = sqlx::query(&sql)
            .bind(&row.id)
            .bind(row.timestamp)
            .bind(row.followers)
            .bind(row.popularity)
            .execute(&mut *tx)
            .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;

    Ok(inserted)
}
