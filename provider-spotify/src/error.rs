//! Error types for the catalog provider

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotifyError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Catalog API rate limited the request")]
    RateLimited { retry_after_seconds: Option<u64> },

    /// The access token was rejected; it has been dropped from the cache.
    #[error("Access token rejected for client {client_id}")]
    Unauthorized { client_id: String },

    #[error("Catalog API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to parse catalog response: {0}")]
    ParseError(String),

    #[error("Too many ids in one request: {count} (max {max})")]
    TooManyIds { count: usize, max: usize },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, SpotifyError>;

impl From<SpotifyError> for BridgeError {
    fn from(error: SpotifyError) -> Self {
        match error {
            SpotifyError::Auth(e) => e.into(),
            SpotifyError::RateLimited {
                retry_after_seconds,
            } => BridgeError::RateLimited {
                retry_after_seconds,
            },
            SpotifyError::Bridge(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
