//! Error types for search.

use thiserror::Error;

/// Errors from the search pipeline.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The pack store failed.
    #[error(transparent)]
    Store(#[from] libragen_store::StoreError),

    /// Query embedding or reranking failed.
    #[error(transparent)]
    Embed(#[from] libragen_embed::EmbedError),
}
