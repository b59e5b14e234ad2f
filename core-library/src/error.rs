use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input database does not exist.
    #[error("File not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

impl LibraryError {
    pub fn missing_file(path: impl Into<PathBuf>) -> Self {
        LibraryError::MissingFile { path: path.into() }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
