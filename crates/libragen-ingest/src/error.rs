//! Error types for source reading and chunking.

use thiserror::Error;

/// Errors from the ingest stage.
#[derive(Debug, Error)]
pub enum IngestError {
    /// An include or ignore glob failed to compile.
    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// A file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
