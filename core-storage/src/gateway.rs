//! # Object Store Gateway
//!
//! Transfer orchestration on top of an [`ObjectStore`]:
//!
//! - **Uploads** go out in a single `PUT` when the file fits in one part,
//!   otherwise as a multipart upload of fixed-size parts with a progress line
//!   per part. A failed multipart upload is aborted so no orphaned parts are
//!   left behind.
//! - **Copies** use the store's server-side copy below its size limit and
//!   fall back to streaming the source into a multipart upload above it.
//! - **Downloads** stream straight to disk; shards can be several gigabytes.
//! - **Deletes** are batched and report the keys the store confirmed.
//!
//! Nothing here retries. Errors surface as [`StorageError`] and the caller
//! decides what to do.

use crate::error::{Result, StorageError};
use bridge_traits::object_store::{CompletedPart, ObjectStore, ObjectSummary};
use bytes::Bytes;
use core_runtime::config::TransferSettings;
use core_runtime::logging::{bytes_to_mb, PhaseTimer};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

/// Most keys a single batch-delete call accepts.
pub const MAX_DELETE_BATCH: usize = 1000;

/// A partially written download. The file is removed when the guard is
/// dropped, including when the transfer future is cancelled mid-copy.
struct StagingFile {
    path: PathBuf,
    armed: bool,
}

impl StagingFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Called once the file has been renamed into place.
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed unfinished download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Unfinished download not removed"),
        }
    }
}

/// How an object reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStrategy {
    SinglePut,
    Multipart { parts: u32 },
    ServerSideCopy,
    /// Downloaded from the source and re-uploaded in parts
    StreamedMultipart { parts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub bucket: String,
    pub key: String,
    pub bytes: u64,
    pub strategy: TransferStrategy,
}

/// Progress after one multipart part has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartProgress {
    pub part_number: i32,
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl PartProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_sent as f64 / self.total_bytes as f64 * 100.0
    }
}

impl fmt::Display for PartProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Part {} - {} / {} - {:.0}% complete",
            self.part_number,
            bytes_to_mb(self.bytes_sent),
            bytes_to_mb(self.total_bytes),
            self.percent()
        )
    }
}

/// Name of the local file an object key downloads to: the last path segment.
pub fn local_name_for_key(key: &str) -> Result<&str> {
    match key.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name),
        _ => Err(StorageError::InvalidKey(key.to_string())),
    }
}

/// Read up to `limit` bytes, stopping early only at end of stream.
async fn read_chunk<R>(reader: &mut R, limit: u64) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buffer = Vec::with_capacity(limit.min(64 * 1024 * 1024) as usize);
    (&mut *reader).take(limit).read_to_end(&mut buffer).await?;
    Ok(Bytes::from(buffer))
}

pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    settings: TransferSettings,
}

impl ObjectStoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>, settings: TransferSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    #[instrument(skip(self))]
    pub async fn list(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<ObjectSummary>> {
        let objects = self
            .store
            .list_objects(bucket, prefix.unwrap_or_default())
            .await?;
        debug!(count = objects.len(), "Listed objects");
        Ok(objects)
    }

    /// Stream `bucket/key` into `dir/<last key segment>`.
    ///
    /// The body is written to a `.download` sibling first and renamed into
    /// place once complete, so an interrupted download never looks finished.
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub async fn download(&self, bucket: &str, key: &str, dir: &Path) -> Result<PathBuf> {
        let name = local_name_for_key(key)?;
        let destination = dir.join(name);
        let staging = dir.join(format!("{}.download", name));

        let timer = PhaseTimer::start("download", format!("Downloading {}/{}", bucket, key));

        let mut body = self.store.get_object(bucket, key).await?;
        let guard = StagingFile::new(staging);
        let mut file = tokio::fs::File::create(guard.path()).await?;
        let written = tokio::io::copy(&mut body, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(guard.path(), &destination).await?;
        guard.keep();

        info!(bytes = written, size = %bytes_to_mb(written), path = %destination.display(), "Downloaded object");
        timer.finish();
        Ok(destination)
    }

    /// Download several objects into `dir`, with at most
    /// `download_concurrency` transfers in flight. Each transfer is itself
    /// sequential. Returned paths are in completion order.
    pub async fn download_objects(
        &self,
        bucket: &str,
        keys: &[String],
        dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let timer = PhaseTimer::start(
            "download_objects",
            format!("Downloading {} objects from {}", keys.len(), bucket),
        );

        let paths: Vec<PathBuf> = stream::iter(keys.iter())
            .map(|key| self.download(bucket, key, dir))
            .buffer_unordered(self.settings.download_concurrency.max(1))
            .try_collect()
            .await?;

        timer.finish();
        Ok(paths)
    }

    /// Upload a local file to `bucket/key`.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn upload(&self, bucket: &str, key: &str, path: &Path) -> Result<TransferReport> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(StorageError::MissingFile { path: path.to_path_buf() }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::MissingFile { path: path.to_path_buf() })
            }
            Err(e) => return Err(e.into()),
        };
        let size = metadata.len();

        let timer = PhaseTimer::start(
            "upload",
            format!("Uploading {} ({}) to {}/{}", path.display(), bytes_to_mb(size), bucket, key),
        );

        let strategy = if size <= self.settings.part_size {
            let body = tokio::fs::read(path).await?;
            self.store.put_object(bucket, key, Bytes::from(body)).await?;
            TransferStrategy::SinglePut
        } else {
            let mut file = tokio::fs::File::open(path).await?;
            let parts = self.multipart_from_reader(bucket, key, &mut file, size).await?;
            TransferStrategy::Multipart { parts }
        };

        timer.finish();
        Ok(TransferReport {
            bucket: bucket.to_string(),
            key: key.to_string(),
            bytes: size,
            strategy,
        })
    }

    /// Copy an object between buckets.
    ///
    /// Objects smaller than `copy_limit` are copied server-side. Larger
    /// objects are streamed down and re-uploaded in parts.
    #[instrument(skip(self))]
    pub async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        target_bucket: &str,
        target_key: &str,
    ) -> Result<TransferReport> {
        let source = self.store.head_object(source_bucket, source_key).await?;

        let timer = PhaseTimer::start(
            "copy",
            format!(
                "Copying {}/{} ({}) to {}/{}",
                source_bucket,
                source_key,
                bytes_to_mb(source.size),
                target_bucket,
                target_key
            ),
        );

        let strategy = if source.size < self.settings.copy_limit {
            self.store
                .copy_object(source_bucket, source_key, target_bucket, target_key)
                .await?;
            TransferStrategy::ServerSideCopy
        } else {
            info!(
                size = source.size,
                limit = self.settings.copy_limit,
                "Object exceeds server-side copy limit, streaming"
            );
            let mut body = self.store.get_object(source_bucket, source_key).await?;
            let parts = self
                .multipart_from_reader(target_bucket, target_key, &mut body, source.size)
                .await?;
            TransferStrategy::StreamedMultipart { parts }
        };

        timer.finish();
        Ok(TransferReport {
            bucket: target_bucket.to_string(),
            key: target_key.to_string(),
            bytes: source.size,
            strategy,
        })
    }

    /// Delete `keys` from `bucket` and return the keys the store confirmed.
    ///
    /// Callers must treat keys missing from the result as still present.
    #[instrument(skip(self, keys), fields(requested = keys.len()))]
    pub async fn delete(&self, bucket: &str, keys: &[String]) -> Result<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let timer = PhaseTimer::start(
            "delete_objects",
            format!("Deleting {} objects from {}", keys.len(), bucket),
        );

        let mut deleted = Vec::with_capacity(keys.len());
        for batch in keys.chunks(MAX_DELETE_BATCH) {
            deleted.extend(self.store.delete_objects(bucket, batch).await?);
        }

        if deleted.len() < keys.len() {
            warn!(
                requested = keys.len(),
                deleted = deleted.len(),
                "Store did not confirm every deletion"
            );
        }

        info!(deleted = deleted.len(), "Deleted objects");
        timer.finish();
        Ok(deleted)
    }

    async fn multipart_from_reader<R>(
        &self,
        bucket: &str,
        key: &str,
        reader: &mut R,
        total_bytes: u64,
    ) -> Result<u32>
    where
        R: AsyncRead + Unpin + Send,
    {
        let upload_id = self.store.create_multipart_upload(bucket, key).await?;
        debug!(upload_id = %upload_id, "Started multipart upload");

        let parts = match self
            .upload_parts(bucket, key, &upload_id, reader, total_bytes)
            .await
        {
            Ok(parts) => parts,
            Err(e) => {
                self.abort(bucket, key, &upload_id).await;
                return Err(e);
            }
        };

        let count = parts.len() as u32;
        if let Err(e) = self
            .store
            .complete_multipart_upload(bucket, key, &upload_id, parts)
            .await
        {
            self.abort(bucket, key, &upload_id).await;
            return Err(e.into());
        }

        Ok(count)
    }

    async fn upload_parts<R>(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        reader: &mut R,
        total_bytes: u64,
    ) -> Result<Vec<CompletedPart>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut parts = Vec::new();
        let mut bytes_sent = 0u64;
        let mut part_number = 1i32;

        loop {
            let chunk = read_chunk(reader, self.settings.part_size).await?;
            if chunk.is_empty() {
                break;
            }
            let chunk_len = chunk.len() as u64;

            let part = self
                .store
                .upload_part(bucket, key, upload_id, part_number, chunk)
                .await
                .map_err(|source| StorageError::PartFailed {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    part_number,
                    source,
                })?;
            parts.push(part);

            bytes_sent += chunk_len;
            let progress = PartProgress {
                part_number,
                bytes_sent,
                total_bytes: total_bytes.max(bytes_sent),
            };
            info!(bucket, key, part_number, bytes_sent, "{}", progress);

            part_number += 1;
        }

        Ok(parts)
    }

    async fn abort(&self, bucket: &str, key: &str, upload_id: &str) {
        match self.store.abort_multipart_upload(bucket, key, upload_id).await {
            Ok(()) => warn!(bucket, key, upload_id, "Aborted multipart upload"),
            Err(e) => warn!(bucket, key, upload_id, error = %e, "Failed to abort multipart upload"),
        }
    }
}
