use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The object store rejected or failed a call.
    #[error("Object store error: {0}")]
    Store(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Multipart upload of {bucket}/{key} failed at part {part_number}: {source}")]
    PartFailed {
        bucket: String,
        key: String,
        part_number: i32,
        #[source]
        source: BridgeError,
    },
}

pub type Result<T> = std::result::Result<T, StorageError>;
