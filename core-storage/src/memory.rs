//! In-process [`ObjectStore`] backed by a map, for tests and local dry runs.
//!
//! Multipart uploads are tracked until completed or aborted, and every call
//! is recorded so callers can assert which store operations a transfer used.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::object_store::{CompletedPart, ObjectBody, ObjectStore, ObjectSummary};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, Bytes>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<(String, String), StoredObject>,
    uploads: HashMap<String, PendingUpload>,
    next_upload: u64,
    operations: Vec<String>,
    /// Keys that `delete_objects` silently keeps
    undeletable: HashSet<(String, String)>,
    /// Part numbers that `upload_part` rejects
    failing_parts: HashSet<i32>,
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.state().objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                last_modified: Utc::now(),
            },
        );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.data.clone())
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Names of the store calls made so far, in order.
    pub fn operations(&self) -> Vec<String> {
        self.state().operations.clone()
    }

    pub fn pending_uploads(&self) -> usize {
        self.state().uploads.len()
    }

    /// Make `delete_objects` leave this key in place and omit it from the
    /// deleted list.
    pub fn protect(&self, bucket: &str, key: &str) {
        self.state()
            .undeletable
            .insert((bucket.to_string(), key.to_string()));
    }

    pub fn fail_part(&self, part_number: i32) {
        self.state().failing_parts.insert(part_number);
    }

    fn record(&self, operation: &str) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.operations.push(operation.to_string());
        state
    }
}

fn not_found(bucket: &str, key: &str) -> BridgeError {
    BridgeError::NotFound(format!("{}/{}", bucket, key))
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let state = self.record("list_objects");
        Ok(state
            .objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), object)| ObjectSummary {
                key: k.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
            })
            .collect())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectSummary> {
        let state = self.record("head_object");
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| ObjectSummary {
                key: key.to_string(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
            })
            .ok_or_else(|| not_found(bucket, key))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let state = self.record("get_object");
        let data = state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.data.clone())
            .ok_or_else(|| not_found(bucket, key))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let mut state = self.record("put_object");
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: body,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let mut state = self.record("create_multipart_upload");
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart> {
        let mut state = self.record("upload_part");
        if state.failing_parts.contains(&part_number) {
            return Err(BridgeError::OperationFailed(format!(
                "part {} rejected",
                part_number
            )));
        }
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| BridgeError::NotFound(format!("upload {}", upload_id)))?;
        upload.parts.insert(part_number, body);
        Ok(CompletedPart {
            part_number,
            etag: format!("\"{}-{}\"", upload_id, part_number),
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let mut state = self.record("complete_multipart_upload");
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| BridgeError::NotFound(format!("upload {}", upload_id)))?;
        if upload.bucket != bucket || upload.key != key {
            return Err(BridgeError::OperationFailed(format!(
                "upload {} belongs to {}/{}",
                upload_id, upload.bucket, upload.key
            )));
        }

        let mut data = BytesMut::new();
        for part in &parts {
            let body = upload.parts.get(&part.part_number).ok_or_else(|| {
                BridgeError::OperationFailed(format!("part {} was never uploaded", part.part_number))
            })?;
            data.extend_from_slice(body);
        }

        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.freeze(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn abort_multipart_upload(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<()> {
        let mut state = self.record("abort_multipart_upload");
        state.uploads.remove(upload_id);
        Ok(())
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        target_bucket: &str,
        target_key: &str,
    ) -> Result<()> {
        let mut state = self.record("copy_object");
        let object = state
            .objects
            .get(&(source_bucket.to_string(), source_key.to_string()))
            .cloned()
            .ok_or_else(|| not_found(source_bucket, source_key))?;
        state
            .objects
            .insert((target_bucket.to_string(), target_key.to_string()), object);
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<String>> {
        let mut state = self.record("delete_objects");
        let mut deleted = Vec::new();
        for key in keys {
            let id = (bucket.to_string(), key.clone());
            if state.undeletable.contains(&id) {
                continue;
            }
            state.objects.remove(&id);
            deleted.push(key.clone());
        }
        Ok(deleted)
    }
}
