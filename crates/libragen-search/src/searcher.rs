//! The search pipeline: embed → retrieve candidates → fuse → rerank →
//! expand context.

use serde::{Deserialize, Serialize};
use tracing::debug;

use libragen_core::cancel::CancelToken;
use libragen_core::progress::RerankProgressFn;
use libragen_embed::{EmbedError, RerankedDocument, Reranker, TextEncoder};
use libragen_store::{ChunkRow, PackStore, ScoredChunk, SearchFilters};

use crate::error::SearchError;
use crate::hybrid::fuse;

/// Candidate depth multiplier: both retrievers fetch `4·k` candidates
/// before fusion.
const CANDIDATE_MULTIPLIER: usize = 4;

/// One search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Maximum results returned.
    pub k: usize,
    /// RRF blend: `0.0` lexical only, `1.0` vector only.
    pub hybrid_alpha: f64,
    pub content_version: Option<String>,
    pub source_glob: Option<String>,
    /// Neighbor chunks fetched before each hit.
    pub context_before: usize,
    /// Neighbor chunks fetched after each hit.
    pub context_after: usize,
    /// Rescore fused candidates with the cross-encoder.
    pub rerank: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            k: 10,
            hybrid_alpha: 0.5,
            content_version: None,
            source_glob: None,
            context_before: 0,
            context_after: 0,
            rerank: false,
        }
    }
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    fn filters(&self) -> SearchFilters {
        SearchFilters {
            content_version: self.content_version.clone(),
            source_glob: self.source_glob.clone(),
        }
    }
}

/// A neighbor chunk attached to a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub chunk_id: i64,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl From<ChunkRow> for ContextChunk {
    fn from(row: ChunkRow) -> Self {
        Self {
            chunk_id: row.id,
            content: row.content,
            start_line: row.start_line,
            end_line: row.end_line,
        }
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub content: String,
    /// Fused RRF score, or the raw cross-encoder score when reranked.
    pub score: f64,
    pub source_file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub language: Option<String>,
    pub content_version: Option<String>,
    pub context_before: Vec<ContextChunk>,
    pub context_after: Vec<ContextChunk>,
}

/// A [`Reranker`] that is never invoked; use it to satisfy the type
/// parameter when searching without one: `None::<&NoReranker>`.
pub struct NoReranker;

impl Reranker for NoReranker {
    async fn rerank(
        &self,
        _query: &str,
        _documents: &[String],
        _top_k: Option<usize>,
        _progress: Option<&RerankProgressFn>,
        _cancel: &CancelToken,
    ) -> Result<Vec<RerankedDocument>, EmbedError> {
        Ok(Vec::new())
    }
}

/// Hybrid search over one pack.
///
/// Empty or whitespace queries return no results. Results are totally
/// ordered by score descending, then ascending chunk id.
///
/// # Errors
///
/// Returns [`SearchError`] on store, embedding, or reranker failure.
pub async fn search<E, R>(
    store: &PackStore,
    encoder: &E,
    reranker: Option<&R>,
    request: &SearchRequest,
    cancel: &CancelToken,
) -> Result<Vec<SearchHit>, SearchError>
where
    E: TextEncoder,
    R: Reranker,
{
    if request.query.trim().is_empty() || request.k == 0 {
        return Ok(Vec::new());
    }

    let query_vec = encoder.embed(&request.query).await?;
    let filters = request.filters();
    let depth = request.k * CANDIDATE_MULTIPLIER;

    let vector = store.vector_search(&query_vec, depth, &filters).await?;
    let keyword = store.keyword_search(&request.query, depth, &filters).await?;
    debug!(
        vector_candidates = vector.len(),
        keyword_candidates = keyword.len(),
        "retrieved candidates"
    );

    let mut fused = fuse(vector, keyword, request.hybrid_alpha);
    fused.truncate(request.k);

    if request.rerank {
        if let Some(reranker) = reranker {
            fused = rerank_fused(fused, &request.query, reranker, cancel).await?;
        }
    }

    let mut hits = Vec::with_capacity(fused.len());
    for (chunk, score) in fused {
        let context_before = store
            .context_before(chunk.source_id, chunk.id, request.context_before)
            .await?
            .into_iter()
            .map(ContextChunk::from)
            .collect();
        let context_after = store
            .context_after(chunk.source_id, chunk.id, request.context_after)
            .await?
            .into_iter()
            .map(ContextChunk::from)
            .collect();

        hits.push(SearchHit {
            chunk_id: chunk.id,
            content: chunk.content,
            score,
            source_file: chunk.source_file,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            language: chunk.language,
            content_version: chunk.content_version,
            context_before,
            context_after,
        });
    }

    Ok(hits)
}

/// Replace fused scores with raw cross-encoder scores and re-sort.
async fn rerank_fused<R: Reranker>(
    fused: Vec<(ChunkRow, f64)>,
    query: &str,
    reranker: &R,
    cancel: &CancelToken,
) -> Result<Vec<(ChunkRow, f64)>, SearchError> {
    if fused.is_empty() {
        return Ok(fused);
    }

    let documents: Vec<String> = fused.iter().map(|(c, _)| c.content.clone()).collect();
    let reranked = reranker
        .rerank(query, &documents, None, None, cancel)
        .await?;

    let mut chunks: Vec<Option<ChunkRow>> = fused.into_iter().map(|(c, _)| Some(c)).collect();
    let mut rescored: Vec<(ChunkRow, f64)> = reranked
        .into_iter()
        .filter_map(|r| {
            chunks
                .get_mut(r.index)
                .and_then(Option::take)
                .map(|chunk| (chunk, f64::from(r.score)))
        })
        .collect();

    rescored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
    Ok(rescored)
}

/// Dense-only retrieval: embed `query` and return the store's top `k` by
/// cosine similarity.
///
/// # Errors
///
/// Returns [`SearchError`] on store or embedding failure.
pub async fn vector_search<E: TextEncoder>(
    store: &PackStore,
    encoder: &E,
    query: &str,
    k: usize,
    filters: &SearchFilters,
) -> Result<Vec<ScoredChunk>, SearchError> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }
    let query_vec = encoder.embed(query).await?;
    Ok(store.vector_search(&query_vec, k, filters).await?)
}

/// Lexical-only retrieval over the pack's BM25 index.
///
/// # Errors
///
/// Returns [`SearchError`] on store failure.
pub async fn keyword_search(
    store: &PackStore,
    query: &str,
    k: usize,
    filters: &SearchFilters,
) -> Result<Vec<ScoredChunk>, SearchError> {
    Ok(store.keyword_search(query, k, filters).await?)
}
