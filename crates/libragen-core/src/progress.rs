//! Progress events reported by long operations.
//!
//! Operations report progress through plain `Fn` callbacks so callers can
//! bridge to channels, progress bars, or MCP notifications without this
//! crate knowing about any of them.

use serde::{Deserialize, Serialize};

/// Fired after each embedding batch completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedProgress {
    /// 1-based batch number.
    pub batch: usize,
    pub total_batches: usize,
    /// Texts embedded so far.
    pub processed: usize,
    pub total: usize,
}

/// Fired after each reranker batch completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerankProgress {
    /// 1-based batch number.
    pub current_batch: usize,
    pub total_batches: usize,
    pub processed_count: usize,
    pub total_count: usize,
}

/// Fired as download bytes arrive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Total bytes when the server reported a length.
    pub total: Option<u64>,
    /// 0–100, `None` when the total is unknown.
    pub percent: Option<f64>,
}

impl DownloadProgress {
    /// Build a progress event, deriving `percent` from the totals.
    #[must_use]
    pub fn new(downloaded: u64, total: Option<u64>) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let percent = total
            .filter(|t| *t > 0)
            .map(|t| (downloaded as f64 / t as f64) * 100.0);
        Self {
            downloaded,
            total,
            percent,
        }
    }
}

/// Callback type for embedding progress.
pub type EmbedProgressFn = dyn Fn(&EmbedProgress) + Send + Sync;

/// Callback type for rerank progress.
pub type RerankProgressFn = dyn Fn(&RerankProgress) + Send + Sync;

/// Callback type for download progress.
pub type DownloadProgressFn = dyn Fn(&DownloadProgress) + Send + Sync;
