//! Error types for pack building.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the build pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An ingest root named in the build config does not exist.
    #[error("Source path not found: {0}")]
    MissingSource(PathBuf),

    /// The output pack file already exists.
    #[error("Output already exists: {0}")]
    AlreadyExists(PathBuf),

    /// The source tree produced no chunks and `allow_empty` was not set.
    #[error("No chunks were produced from the source tree")]
    NoChunks,

    /// Source reading failed.
    #[error(transparent)]
    Ingest(#[from] libragen_ingest::IngestError),

    /// Embedding failed (including model load failure and cancellation).
    #[error(transparent)]
    Embed(#[from] libragen_embed::EmbedError),

    /// The pack store failed.
    #[error(transparent)]
    Store(#[from] libragen_store::StoreError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
