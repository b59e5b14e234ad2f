use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use core_library::LibraryError;
use core_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Library(#[from] LibraryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {}", path.display())]
    MissingFile { path: PathBuf },
}

impl SyncError {
    /// Failures caused by missing inputs or bad configuration rather than by
    /// the run itself. Retrying without operator action will not help.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_)
                | SyncError::MissingFile { .. }
                | SyncError::Auth(AuthError::Configuration(_))
                | SyncError::Library(LibraryError::MissingFile { .. })
                | SyncError::Storage(StorageError::MissingFile { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(SyncError::Config("no pool".to_string()).is_precondition());
        assert!(SyncError::from(LibraryError::missing_file("artist_ids.db")).is_precondition());
        assert!(SyncError::from(AuthError::Configuration("empty".to_string())).is_precondition());
        assert!(!SyncError::from(BridgeError::OperationFailed("boom".to_string())).is_precondition());
    }
}
