//! Error types for embedding and reranking.

use thiserror::Error;

/// Errors from model loading and inference.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The embedding or reranker model could not be loaded.
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// Inference on a batch failed.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The operation was canceled at a batch boundary.
    #[error("Operation canceled")]
    Canceled,

    /// A blocking inference task panicked or was aborted.
    #[error("Inference task failed: {0}")]
    Task(String),
}
