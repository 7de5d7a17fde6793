//! Weighted Reciprocal Rank Fusion.
//!
//! Each candidate list contributes `weight / (RRF_K + rank)` with 1-based
//! ranks; a document absent from a list gets no contribution from it.
//! Alpha controls the blend:
//! - `0.0` = lexical only
//! - `1.0` = vector only
//! - `0.5` (default) = equal weight

use std::collections::HashMap;

use libragen_store::{ChunkRow, ScoredChunk};

/// RRF rank-smoothing constant.
pub const RRF_K: f64 = 60.0;

/// Fuse vector and keyword candidates into `(chunk, fused_score)` pairs,
/// sorted by score descending with ascending chunk id as the tie-break.
///
/// `alpha` is clamped to `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fuse(
    vector: Vec<ScoredChunk>,
    keyword: Vec<ScoredChunk>,
    alpha: f64,
) -> Vec<(ChunkRow, f64)> {
    let alpha = alpha.clamp(0.0, 1.0);

    let mut fused: HashMap<i64, (ChunkRow, f64)> = HashMap::new();

    for (rank, candidate) in vector.into_iter().enumerate() {
        let contribution = alpha / (RRF_K + (rank + 1) as f64);
        fused
            .entry(candidate.chunk.id)
            .and_modify(|(_, score)| *score += contribution)
            .or_insert((candidate.chunk, contribution));
    }

    for (rank, candidate) in keyword.into_iter().enumerate() {
        let contribution = (1.0 - alpha) / (RRF_K + (rank + 1) as f64);
        fused
            .entry(candidate.chunk.id)
            .and_modify(|(_, score)| *score += contribution)
            .or_insert((candidate.chunk, contribution));
    }

    let mut results: Vec<(ChunkRow, f64)> = fused.into_values().collect();
    results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
    results
}
