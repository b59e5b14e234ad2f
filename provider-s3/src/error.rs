//! Error types for the S3 provider

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum S3Error {
    /// The service answered with an error status, or the request never
    /// reached it
    #[error(
        "S3 {operation} failed for {target} (status {}): {message}",
        .status.map_or_else(|| "none".to_string(), |s| s.to_string())
    )]
    Request {
        operation: &'static str,
        target: String,
        status: Option<u16>,
        message: String,
    },

    #[error("S3 object not found: {target}")]
    NotFound { target: String },

    /// A response lacked a field the protocol guarantees
    #[error("S3 {operation} response is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("Invalid S3 request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, S3Error>;

impl S3Error {
    /// Translate an SDK failure, folding 404 responses into `NotFound`.
    pub fn from_sdk<E>(
        operation: &'static str,
        bucket: &str,
        key: Option<&str>,
        error: SdkError<E, HttpResponse>,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let status = error.raw_response().map(|r| r.status().as_u16());
        let message = DisplayErrorContext(&error).to_string();
        Self::classify(operation, target(bucket, key), status, message)
    }

    fn classify(
        operation: &'static str,
        target: String,
        status: Option<u16>,
        message: String,
    ) -> Self {
        if status == Some(404) || message.contains("NoSuchKey") || message.contains("NoSuchBucket")
        {
            return S3Error::NotFound { target };
        }
        S3Error::Request {
            operation,
            target,
            status,
            message,
        }
    }
}

fn target(bucket: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("{}/{}", bucket, key),
        None => bucket.to_string(),
    }
}

impl From<S3Error> for BridgeError {
    fn from(error: S3Error) -> Self {
        match error {
            S3Error::NotFound { target } => BridgeError::NotFound(target),
            S3Error::Request {
                status: Some(429) | Some(503),
                ..
            } => BridgeError::RateLimited {
                retry_after_seconds: None,
            },
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let error = S3Error::classify("get_object", target("b", Some("k")), Some(404), String::new());
        assert!(matches!(error, S3Error::NotFound { ref target } if target == "b/k"));

        let error = S3Error::classify(
            "head_object",
            target("b", Some("k")),
            None,
            "service error: NoSuchKey".to_string(),
        );
        assert!(matches!(error, S3Error::NotFound { .. }));
    }

    #[test]
    fn test_request_error_display() {
        let error = S3Error::classify("put_object", target("b", Some("k")), Some(403), "AccessDenied".to_string());
        assert_eq!(
            error.to_string(),
            "S3 put_object failed for b/k (status 403): AccessDenied"
        );
    }

    #[test]
    fn test_bridge_conversion() {
        let not_found: BridgeError = S3Error::NotFound {
            target: "b/k".to_string(),
        }
        .into();
        assert!(matches!(not_found, BridgeError::NotFound(_)));

        let slow_down: BridgeError =
            S3Error::classify("upload_part", target("b", None), Some(503), "SlowDown".to_string()).into();
        assert!(slow_down.is_rate_limited());

        let missing: BridgeError = S3Error::MissingField {
            operation: "create_multipart_upload",
            field: "UploadId",
        }
        .into();
        assert!(matches!(missing, BridgeError::OperationFailed(_)));
    }
}
