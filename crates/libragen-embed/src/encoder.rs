//! The dense text encoder.
//!
//! BGE-family models benefit from `"query: "` / `"passage: "` prefixes;
//! that is the caller's concern. This module only guarantees unit-norm
//! output vectors of the configured dimension and one-batch-group-per-call
//! semantics: the model mutex is held for the whole call, so batches from
//! concurrent callers never interleave.

use std::path::PathBuf;

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use tokio::sync::Mutex;
use tracing::{debug, info};

use libragen_core::cancel::CancelToken;
use libragen_core::paths::Paths;
use libragen_core::progress::{EmbedProgress, EmbedProgressFn};

use crate::error::EmbedError;

/// Capability interface for dense text encoders.
///
/// Implementations must be shareable across concurrent searches; each
/// `embed_batch` call is one batch group.
#[allow(async_fn_in_trait)]
pub trait TextEncoder: Send + Sync {
    /// Output vector dimension.
    fn dimensions(&self) -> usize;

    /// Embed one text into a unit-norm vector.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] on model load or inference failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed many texts, firing `progress` after each internal batch and
    /// checking `cancel` at batch boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Canceled`] when canceled, otherwise model
    /// load or inference failures.
    async fn embed_batch(
        &self,
        texts: &[String],
        progress: Option<&EmbedProgressFn>,
        cancel: &CancelToken,
    ) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Configuration for [`FastEmbedder`].
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    /// Model name, e.g. `"bge-small-en-v1.5"`.
    pub model: String,
    /// Expected output dimension.
    pub dimensions: usize,
    /// `"q8"` selects the quantized model variant; `"f32"` the full one.
    pub quantization: String,
    /// Texts per inference batch.
    pub batch_size: usize,
    /// Where model files are downloaded and cached.
    pub cache_dir: PathBuf,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model: "bge-small-en-v1.5".to_string(),
            dimensions: 384,
            quantization: "q8".to_string(),
            batch_size: 32,
            cache_dir: Paths::resolve().models_dir().to_path_buf(),
        }
    }
}

impl EmbedderConfig {
    /// Config with the model cache under the resolved Libragen home.
    #[must_use]
    pub fn with_paths(paths: &Paths) -> Self {
        Self {
            cache_dir: paths.models_dir().to_path_buf(),
            ..Default::default()
        }
    }
}

/// fastembed-backed [`TextEncoder`].
pub struct FastEmbedder {
    config: EmbedderConfig,
    /// `None` until first use and after `dispose`. Holding the lock for
    /// the whole of `embed_batch` keeps each call a single batch group.
    model: Mutex<Option<TextEmbedding>>,
}

impl FastEmbedder {
    #[must_use]
    pub fn new(config: EmbedderConfig) -> Self {
        Self {
            config,
            model: Mutex::new(None),
        }
    }

    /// Eagerly load the model. Optional: `embed` calls load on demand.
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

    /// Release the model. The next embed call re-initializes.
    pub async fn dispose(&self) {
        let mut guard = self.model.lock().await;
        if guard.take().is_some() {
            debug!(model = %self.config.model, "disposed embedding model");
        }
    }

    async fn load(&self) -> Result<TextEmbedding, EmbedError> {
        let model = select_model(&self.config.model, &self.config.quantization)?;
        let options = TextInitOptions::new(model)
            .with_cache_dir(self.config.cache_dir.clone())
            .with_show_download_progress(false);

        info!(model = %self.config.model, quantization = %self.config.quantization, "loading embedding model");
        tokio::task::spawn_blocking(move || TextEmbedding::try_new(options))
            .await
            .map_err(|e| EmbedError::Task(e.to_string()))?
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))
    }
}

impl TextEncoder for FastEmbedder {
    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self
            .embed_batch(&[text.to_string()], None, &CancelToken::new())
            .await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::Inference("model returned no vector".to_string()))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        progress: Option<&EmbedProgressFn>,
        cancel: &CancelToken,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = self.model.lock().await;
        let mut model = match guard.take() {
            Some(model) => model,
            None => self.load().await?,
        };

        let total = texts.len();
        let batch_size = self.config.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);

        let mut out: Vec<Vec<f32>> = Vec::with_capacity(total);
        for (index, batch) in texts.chunks(batch_size).enumerate() {
            if cancel.is_canceled() {
                *guard = Some(model);
                return Err(EmbedError::Canceled);
            }

            let owned: Vec<String> = batch.to_vec();
            let (returned, result) = tokio::task::spawn_blocking(move || {
                let result = model.embed(owned, None);
                (model, result)
            })
            .await
            .map_err(|e| EmbedError::Task(e.to_string()))?;
            model = returned;

            let vectors = match result {
                Ok(v) => v,
                Err(e) => {
                    *guard = Some(model);
                    return Err(EmbedError::Inference(e.to_string()));
                }
            };
            out.extend(vectors.into_iter().map(|v| l2_normalize(&v)));

            if let Some(progress) = progress {
                progress(&EmbedProgress {
                    batch: index + 1,
                    total_batches,
                    processed: out.len(),
                    total,
                });
            }
        }

        *guard = Some(model);
        Ok(out)
    }
}

/// Map a model name + quantization to a fastembed model id.
fn select_model(name: &str, quantization: &str) -> Result<EmbeddingModel, EmbedError> {
    let quantized = quantization.eq_ignore_ascii_case("q8");
    let model = match (name, quantized) {
        ("bge-small-en-v1.5", false) => EmbeddingModel::BGESmallENV15,
        ("bge-small-en-v1.5", true) => EmbeddingModel::BGESmallENV15Q,
        ("bge-base-en-v1.5", false) => EmbeddingModel::BGEBaseENV15,
        ("bge-base-en-v1.5", true) => EmbeddingModel::BGEBaseENV15Q,
        ("all-minilm-l6-v2", false) => EmbeddingModel::AllMiniLML6V2,
        ("all-minilm-l6-v2", true) => EmbeddingModel::AllMiniLML6V2Q,
        _ => {
            return Err(EmbedError::ModelLoad(format!(
                "unknown embedding model '{name}' (quantization '{quantization}')"
            )));
        }
    };
    Ok(model)
}

/// Scale a vector to unit L2 norm. Zero vectors pass through unchanged.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}
