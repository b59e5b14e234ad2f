//! Object Store Abstraction
//!
//! Low-level, bucket-addressed blob operations. Transfer strategy (single-shot
//! versus multipart, server-side copy versus stream-and-reupload) lives in the
//! gateway built on top of this trait; implementations only translate calls to
//! their backing store and never retry internally.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::Result;

/// Streaming object body.
pub type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
        }
    }
}

/// A part accepted by the store during a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part index
    pub part_number: i32,
    pub etag: String,
}

/// Object store trait
///
/// Mirrors the S3 API surface the pipeline relies on: paginated listing,
/// streaming get, single put, multipart upload, server-side copy and batch
/// delete.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::object_store::ObjectStore;
///
/// async fn keys(store: &dyn ObjectStore) -> bridge_traits::error::Result<Vec<String>> {
///     let objects = store.list_objects("spotify-data", "spotify-data_").await?;
///     Ok(objects.into_iter().map(|o| o.key).collect())
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object in `bucket` whose key starts with `prefix`,
    /// following continuation tokens. An empty prefix lists everything.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>>;

    /// Fetch object metadata without the body.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectSummary>;

    /// Open a streaming reader over the object body.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    /// Start a multipart upload and return its upload id.
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()>;

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
        -> Result<()>;

    /// Server-side copy. Stores cap the source size (5 GiB on S3).
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        target_bucket: &str,
        target_key: &str,
    ) -> Result<()>;

    /// Batch delete. Returns the keys the store reports as deleted.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<String>>;
}
