//! Cross-encoder reranking.
//!
//! A cross-encoder scores (query, document) pairs directly, which is more
//! accurate than embedding distance but too slow for first-stage
//! retrieval. The searcher feeds it fused candidates only.

use std::path::PathBuf;

use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use tokio::sync::Mutex;
use tracing::{debug, info};

use libragen_core::cancel::CancelToken;
use libragen_core::paths::Paths;
use libragen_core::progress::{RerankProgress, RerankProgressFn};

use crate::error::EmbedError;

/// One rescored document.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankedDocument {
    /// Index into the input slice.
    pub index: usize,
    pub document: String,
    pub score: f32,
}

/// Capability interface for cross-encoder rerankers.
#[allow(async_fn_in_trait)]
pub trait Reranker: Send + Sync {
    /// Rescore `documents` against `query`, sorted by score descending,
    /// optionally truncated to `top_k`. Empty input returns `[]` without
    /// touching the model.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Canceled`] when canceled, otherwise model
    /// load or inference failures.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
        progress: Option<&RerankProgressFn>,
        cancel: &CancelToken,
    ) -> Result<Vec<RerankedDocument>, EmbedError>;
}

/// Configuration for [`FastReranker`].
#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Model name, e.g. `"bge-reranker-base"`.
    pub model: String,
    /// Documents per inference batch.
    pub batch_size: usize,
    pub cache_dir: PathBuf,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model: "bge-reranker-base".to_string(),
            batch_size: 32,
            cache_dir: Paths::resolve().models_dir().to_path_buf(),
        }
    }
}

impl RerankerConfig {
    /// Config with the model cache under the resolved Libragen home.
    #[must_use]
    pub fn with_paths(paths: &Paths) -> Self {
        Self {
            cache_dir: paths.models_dir().to_path_buf(),
            ..Default::default()
        }
    }
}

/// fastembed-backed [`Reranker`].
pub struct FastReranker {
    config: RerankerConfig,
    model: Mutex<Option<TextRerank>>,
}

impl FastReranker {
    #[must_use]
    pub fn new(config: RerankerConfig) -> Self {
        Self {
            config,
            model: Mutex::new(None),
        }
    }

    /// Eagerly load the model. Optional: `rerank` loads on demand.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::ModelLoad`] on failure.
    pub async fn initialize(&self) -> Result<(), EmbedError> {
        let mut guard = self.model.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(())
    }

    /// Release the model. The next rerank call re-initializes.
    pub async fn dispose(&self) {
        let mut guard = self.model.lock().await;
        if guard.take().is_some() {
            debug!(model = %self.config.model, "disposed reranker model");
        }
    }

    async fn load(&self) -> Result<TextRerank, EmbedError> {
        let model = select_model(&self.config.model)?;
        let options = RerankInitOptions::new(model)
            .with_cache_dir(self.config.cache_dir.clone())
            .with_show_download_progress(false);

        info!(model = %self.config.model, "loading reranker model");
        tokio::task::spawn_blocking(move || TextRerank::try_new(options))
            .await
            .map_err(|e| EmbedError::Task(e.to_string()))?
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))
    }
}

impl Reranker for FastReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
        progress: Option<&RerankProgressFn>,
        cancel: &CancelToken,
    ) -> Result<Vec<RerankedDocument>, EmbedError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = self.model.lock().await;
        let mut model = match guard.take() {
            Some(model) => model,
            None => self.load().await?,
        };

        let total = documents.len();
        let batch_size = self.config.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);

        let mut scored: Vec<RerankedDocument> = Vec::with_capacity(total);
        for (index, batch) in documents.chunks(batch_size).enumerate() {
            if cancel.is_canceled() {
                *guard = Some(model);
                return Err(EmbedError::Canceled);
            }

            let batch_start = index * batch_size;
            let owned: Vec<String> = batch.to_vec();
            let query_owned = query.to_string();
            let (returned, result) = tokio::task::spawn_blocking(move || {
                let result = model.rerank(query_owned, owned.clone(), true, None);
                (model, (result, owned))
            })
            .await
            .map_err(|e| EmbedError::Task(e.to_string()))?;
            model = returned;

            let (result, inputs) = result;
            let batch_results = match result {
                Ok(r) => r,
                Err(e) => {
                    *guard = Some(model);
                    return Err(EmbedError::Inference(e.to_string()));
                }
            };

            for item in batch_results {
                let document = item
                    .document
                    .unwrap_or_else(|| inputs.get(item.index).cloned().unwrap_or_default());
                scored.push(RerankedDocument {
                    index: batch_start + item.index,
                    document,
                    score: item.score,
                });
            }

            if let Some(progress) = progress {
                progress(&RerankProgress {
                    current_batch: index + 1,
                    total_batches,
                    processed_count: (batch_start + batch.len()).min(total),
                    total_count: total,
                });
            }
        }

        *guard = Some(model);

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.index.cmp(&b.index))
        });
        if let Some(k) = top_k {
            scored.truncate(k);
        }
        Ok(scored)
    }
}

/// Map a reranker model name to a fastembed model id.
fn select_model(name: &str) -> Result<RerankerModel, EmbedError> {
    let model = match name {
        "bge-reranker-base" => RerankerModel::BGERerankerBase,
        "jina-reranker-v1-turbo-en" => RerankerModel::JINARerankerV1TurboEn,
        _ => {
            return Err(EmbedError::ModelLoad(format!(
                "unknown reranker model '{name}'"
            )));
        }
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_model_maps_known_names() {
        assert!(select_model("bge-reranker-base").is_ok());
        assert!(matches!(
            select_model("nonexistent-reranker"),
            Err(EmbedError::ModelLoad(_))
        ));
    }
}
