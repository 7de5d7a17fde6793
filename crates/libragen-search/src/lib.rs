//! # libragen-search
//!
//! Hybrid retrieval over a pack store: dense vector candidates and BM25
//! lexical candidates fused with weighted Reciprocal Rank Fusion, an
//! optional cross-encoder rerank pass, and neighbor-chunk context
//! expansion.
//!
//! The pipeline is store-agnostic beyond the [`libragen_store::PackStore`]
//! interface and is generic over the [`libragen_embed::TextEncoder`] and
//! [`libragen_embed::Reranker`] capability traits, so tests run against
//! deterministic mock models.

mod error;
mod hybrid;
mod searcher;

pub use error::SearchError;
pub use hybrid::{RRF_K, fuse};
pub use searcher::{
    ContextChunk, NoReranker, SearchHit, SearchRequest, keyword_search, search, vector_search,
};
