//! Error types for collection operations.

use thiserror::Error;

/// Errors from collection resolution and downloads.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// A collection, library, or version is not known.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure: timeout, connection error, or a 4xx/5xx status.
    /// Retryable at the caller's discretion.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Downloaded bytes do not match the declared hash.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// The operation was canceled.
    #[error("Operation canceled")]
    Canceled,

    /// A collection document is malformed (or nested too deeply).
    #[error("Invalid collection: {0}")]
    InvalidFormat(String),

    /// Filesystem failure (cache, config, temp files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse/serialize failure.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CollectionError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
