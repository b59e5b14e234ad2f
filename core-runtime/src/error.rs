use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {variable}: {message}")]
    InvalidVariable { variable: String, message: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl Error {
    /// Whether the error comes from the deployment's settings rather than
    /// from the host.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::InvalidVariable { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
