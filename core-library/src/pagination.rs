//! Offset pagination over `artist_snapshots`.
//!
//! Rows are read in `rowid` order so that successive pages are disjoint and
//! together cover the table exactly once, provided nothing writes to the
//! source while it is being read.

use crate::models::SnapshotRow;
use crate::schema::{count_snapshots, SNAPSHOT_TABLE};
use crate::{LibraryError, Result};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Pagination request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Current page number (0-indexed)
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.page_size as u64
    }

    pub fn limit(&self) -> u32 {
        self.page_size
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }
}

/// One page of rows plus where it sits in the whole table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows in the table when the cursor was opened
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Rows covered by this page and all pages before it.
    pub fn rows_through(&self, page_size: u32) -> u64 {
        (self.page as u64 * page_size as u64 + self.items.len() as u64).min(self.total)
    }
}

/// Restartable cursor over the snapshot table.
///
/// The total is counted once at [`open`](PageCursor::open). Iteration ends
/// after the page that reaches it, or on the first empty page, whichever
/// comes first.
#[derive(Debug, Clone)]
pub struct PageCursor {
    pool: SqlitePool,
    request: PageRequest,
    total: u64,
}

impl PageCursor {
    pub async fn open(pool: SqlitePool, page_size: u32) -> Result<Self> {
        let total = count_snapshots(&pool).await?;
        Ok(Self {
            pool,
            request: PageRequest::new(0, page_size.max(1)),
            total,
        })
    }

    /// Resume at `page`.
    pub fn starting_at(mut self, page: u32) -> Self {
        self.request.page = page;
        self
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn total_pages(&self) -> u32 {
        let size = self.request.page_size as u64;
        ((self.total + size - 1) / size) as u32
    }

    pub async fn next_page(&mut self) -> Result<Option<Page<SnapshotRow>>> {
        if self.request.offset() >= self.total {
            return Ok(None);
        }

        let items = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT id, timestamp, followers, popularity FROM {} ORDER BY rowid LIMIT ? OFFSET ?",
            SNAPSHOT_TABLE
        ))
        .bind(self.request.limit() as i64)
        .bind(self.request.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        if items.is_empty() {
            return Ok(None);
        }

        let page = Page {
            items,
            total: self.total,
            page: self.request.page,
            total_pages: self.total_pages(),
        };
        self.request = self.request.next();
        Ok(Some(page))
    }

    /// The remaining pages as a stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page<SnapshotRow>>> {
        stream::try_unfold(self, |mut cursor| async move {
            let page = cursor.next_page().await?;
            Ok::<_, LibraryError>(page.map(|page| (page, cursor)))
        })
    }
}
