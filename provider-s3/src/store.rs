//! S3-compatible implementation of [`ObjectStore`].
//!
//! Works against AWS S3 and S3-compatible services (Cloudflare R2, MinIO).
//! A custom endpoint switches the client to path-style addressing, which
//! those services expect.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart as S3CompletedPart, Delete, ObjectIdentifier,
};
use bridge_traits::error::Result;
use bridge_traits::object_store::{CompletedPart, ObjectBody, ObjectStore, ObjectSummary};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_runtime::config::ObjectStoreSettings;
use tracing::{debug, instrument, warn};

use crate::error::S3Error;

const CREDENTIALS_SOURCE: &str = "pipeline-config";

/// Value of the `x-amz-copy-source` header for `bucket/key`.
pub fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, urlencoding::encode(key))
}

fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

fn non_negative(size: Option<i64>) -> u64 {
    size.unwrap_or(0).max(0) as u64
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Build a client from pipeline settings.
    ///
    /// Explicit keys take precedence; without them the default AWS provider
    /// chain (environment, profile, instance metadata) is used.
    pub async fn from_settings(settings: &ObjectStoreSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                None,
                None,
                CREDENTIALS_SOURCE,
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        debug!(
            endpoint = settings.endpoint.as_deref().unwrap_or("aws"),
            region = %settings.region,
            "Built S3 client"
        );
        Self::new(aws_sdk_s3::Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| S3Error::from_sdk("list_objects", bucket, None, e))?;

            objects.extend(response.contents().iter().filter_map(|object| {
                object.key().map(|key| ObjectSummary {
                    key: key.to_string(),
                    size: non_negative(object.size()),
                    last_modified: object.last_modified().and_then(to_chrono),
                })
            }));

            match (response.is_truncated(), response.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(count = objects.len(), "Listed S3 objects");
        Ok(objects)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectSummary> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| S3Error::from_sdk("head_object", bucket, Some(key), e))?;

        Ok(ObjectSummary {
            key: key.to_string(),
            size: non_negative(response.content_length()),
            last_modified: response.last_modified().and_then(to_chrono),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| S3Error::from_sdk("get_object", bucket, Some(key), e))?;

        Ok(Box::new(Box::pin(response.body.into_async_read())))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| S3Error::from_sdk("put_object", bucket, Some(key), e))?;
        Ok(())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| S3Error::from_sdk("create_multipart_upload", bucket, Some(key), e))?;

        let upload_id = response.upload_id().ok_or(S3Error::MissingField {
            operation: "create_multipart_upload",
            field: "UploadId",
        })?;
        Ok(upload_id.to_string())
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart> {
        let response = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| S3Error::from_sdk("upload_part", bucket, Some(key), e))?;

        let etag = response.e_tag().ok_or(S3Error::MissingField {
            operation: "upload_part",
            field: "ETag",
        })?;
        Ok(CompletedPart {
            part_number,
            etag: etag.to_string(),
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let parts = parts
            .into_iter()
            .map(|part| {
                S3CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(part.etag)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| S3Error::from_sdk("complete_multipart_upload", bucket, Some(key), e))?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| S3Error::from_sdk("abort_multipart_upload", bucket, Some(key), e))?;
        Ok(())
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        target_bucket: &str,
        target_key: &str,
    ) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(copy_source(source_bucket, source_key))
            .bucket(target_bucket)
            .key(target_key)
            .send()
            .await
            .map_err(|e| S3Error::from_sdk("copy_object", target_bucket, Some(target_key), e))?;
        Ok(())
    }

    #[instrument(skip(self, keys), fields(requested = keys.len()))]
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let identifiers = keys
            .iter()
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|e| S3Error::InvalidRequest(e.to_string()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(false)
            .build()
            .map_err(|e| S3Error::InvalidRequest(e.to_string()))?;

        let response = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| S3Error::from_sdk("delete_objects", bucket, None, e))?;

        for error in response.errors() {
            warn!(
                key = error.key().unwrap_or_default(),
                code = error.code().unwrap_or_default(),
                message = error.message().unwrap_or_default(),
                "S3 refused to delete object"
            );
        }

        Ok(response
            .deleted()
            .iter()
            .filter_map(|deleted| deleted.key().map(str::to_string))
            .collect())
    }
}
