//! Error types for pack management.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from install, uninstall, verification, and updates.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No installed pack (or source file) with that name/path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The source is not a pack, archive, or collection document.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A pack with this name is already installed and `force` is off.
    #[error("Pack '{name}' already installed in {root} (use force to replace)")]
    AlreadyExists { name: String, root: PathBuf },

    /// Stored and recomputed content hashes disagree.
    #[error("Integrity failure for '{pack}': {detail}")]
    IntegrityFailure { pack: String, detail: String },

    /// The operation was canceled.
    #[error("Operation canceled")]
    Canceled,

    /// Pack store failure (open, schema version, metadata).
    #[error(transparent)]
    Store(#[from] libragen_store::StoreError),

    /// Collection client failure (resolution, download, transport).
    #[error(transparent)]
    Collection(#[from] libragen_collections::CollectionError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed embedded JSON (collection.json in an archive).
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
