//! Error types for pack storage.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from pack store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The pack file does not exist.
    #[error("Pack not found: {0}")]
    NotFound(PathBuf),

    /// The file is not a valid pack.
    #[error("Not a valid pack: {0}")]
    InvalidFormat(String),

    /// The pack was written by a newer engine.
    #[error("Pack schema version {found} is newer than supported version {supported}")]
    SchemaVersionTooNew { found: i64, supported: i64 },

    /// The pack needs migration but was opened read-only.
    #[error("Pack schema version {found} requires migration to {required} (opened read-only)")]
    MigrationRequired { found: i64, required: i64 },

    /// A migration batch failed; the pre-migration file was restored.
    #[error("Migration to version {version} failed: {message}")]
    Migration { version: i64, message: String },

    /// Embedding blob or query vector has the wrong length.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    Sql(#[from] libsql::Error),

    /// Filesystem error (backup copy, size probe).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest JSON in `library_meta` is invalid.
    #[error("Invalid manifest JSON: {0}")]
    Manifest(#[from] serde_json::Error),
}
