//! Error types for the tiergate-store crate

use thiserror::Error;

/// Result type alias using `TierError`
pub type Result<T> = std::result::Result<T, TierError>;

/// Errors that can occur during tier operations
#[derive(Error, Debug)]
pub enum TierError {
    /// Key not present in this tier
    #[error("key not found: {0}")]
    NotFound(String),

    /// Key rejected before reaching the backend
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Timeout error
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Remote API returned a failure status
    #[error("backend API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Object store client error
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// Capability not implemented by this tier
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TierError {
    /// True when the key is simply absent from the tier
    pub fn is_not_found(&self) -> bool {
        matches!(self, TierError::NotFound(_))
    }
}

impl From<reqwest::Error> for TierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TierError::Timeout { seconds: 30 }
        } else if err.is_connect() {
            TierError::Connection(err.to_string())
        } else {
            TierError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TierError {
    fn from(err: serde_json::Error) -> Self {
        TierError::Serialization(err.to_string())
    }
}

impl From<object_store::Error> for TierError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => TierError::NotFound(path),
            other => TierError::ObjectStore(other.to_string()),
        }
    }
}
