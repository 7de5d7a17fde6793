//! # libragen-embed
//!
//! Dense embedding and cross-encoder reranking behind capability traits.
//!
//! [`TextEncoder`] and [`Reranker`] are the seams search and build code
//! program against; [`FastEmbedder`] and [`FastReranker`] are the
//! fastembed-backed implementations. fastembed is synchronous (ONNX
//! runtime with internal parallelism), so inference runs through
//! `tokio::task::spawn_blocking`.
//!
//! Models are expensive to load: both implementations initialize lazily
//! behind an async mutex, so concurrent first calls load the model at most
//! once, and `dispose` releases it for a later call to re-initialize.

mod encoder;
mod error;
mod reranker;

pub use encoder::{EmbedderConfig, FastEmbedder, TextEncoder};
pub use error::EmbedError;
pub use reranker::{FastReranker, RerankedDocument, Reranker, RerankerConfig};
