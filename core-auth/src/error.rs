use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing or malformed credential pool. Fatal for the run.
    #[error("Credential configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed for client {client_id}: {reason}")]
    AuthenticationFailed { client_id: String, reason: String },

    #[error("Token endpoint rate limited the request (retry after {retry_after_seconds:?}s)")]
    RateLimited { retry_after_seconds: Option<u64> },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Auth error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl From<AuthError> for BridgeError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::RateLimited {
                retry_after_seconds,
            } => BridgeError::RateLimited {
                retry_after_seconds,
            },
            AuthError::Configuration(msg) => {
                BridgeError::NotAvailable(format!("Credential configuration error: {}", msg))
            }
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
