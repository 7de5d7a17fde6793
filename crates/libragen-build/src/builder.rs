//! Build orchestration.
//!
//! Finalization order matters for reproducibility:
//!
//! 1. all chunks committed,
//! 2. `stats.chunk_count` / `stats.source_count` from the store,
//! 3. content hash over the canonical chunk projection,
//! 4. `stats.file_size` after the final flush,
//! 5. `created_at` if unset.
//!
//! Two builds over identical inputs with identical config produce equal
//! content hashes; the source walk is sorted and chunk ids follow reader
//! order.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use libragen_core::Manifest;
use libragen_core::cancel::CancelToken;
use libragen_core::manifest::{ChunkingInfo, EmbeddingInfo, PackSource, PackStats};
use libragen_core::progress::EmbedProgressFn;
use libragen_embed::TextEncoder;
use libragen_ingest::{ChunkerConfig, ReaderConfig, chunk_text, read_sources};
use libragen_store::{NewChunk, NewSource, PackStore, meta_keys};

use crate::error::BuildError;

/// Configuration for one pack build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Pack name (unique within a pack root).
    pub name: String,
    /// Pack version.
    pub version: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Version of the ingested content (e.g. `"1.74.0"`).
    pub content_version: Option<String>,
    /// `"semver"`, `"date"`, or `"opaque"`.
    pub content_version_type: Option<String>,
    /// Source-of-truth origin recorded in the manifest.
    pub origin: Option<String>,
    pub embedding: EmbeddingInfo,
    pub reader: ReaderConfig,
    pub chunker: ChunkerConfig,
    /// Permit a pack with zero chunks (empty source trees).
    pub allow_empty: bool,
}

impl BuildConfig {
    /// Minimal config with defaults for everything but name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            display_name: None,
            description: None,
            content_version: None,
            content_version_type: None,
            origin: None,
            embedding: EmbeddingInfo::default(),
            reader: ReaderConfig::default(),
            chunker: ChunkerConfig::default(),
            allow_empty: false,
        }
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub path: PathBuf,
    pub chunk_count: u64,
    pub source_count: u64,
    pub content_hash: String,
    pub file_size: u64,
}

/// Build a pack at `output` from the given source roots.
///
/// On any failure (including cancellation) the partially written pack
/// file is deleted.
///
/// # Errors
///
/// - [`BuildError::MissingSource`] if a root does not exist.
/// - [`BuildError::AlreadyExists`] if `output` exists.
/// - [`BuildError::NoChunks`] for an empty source tree without
///   `allow_empty`.
/// - [`BuildError::Embed`] on model load failure or cancellation.
pub async fn build_pack<E: TextEncoder>(
    roots: &[PathBuf],
    output: &Path,
    config: &BuildConfig,
    encoder: &E,
    progress: Option<&EmbedProgressFn>,
    cancel: &CancelToken,
) -> Result<BuildReport, BuildError> {
    for root in roots {
        if !root.exists() {
            return Err(BuildError::MissingSource(root.clone()));
        }
    }
    if output.exists() {
        return Err(BuildError::AlreadyExists(output.to_path_buf()));
    }

    let result = build_inner(roots, output, config, encoder, progress, cancel).await;
    if result.is_err() {
        // Never leave a partial pack at the destination.
        let _ = std::fs::remove_file(output);
    }
    result
}

async fn build_inner<E: TextEncoder>(
    roots: &[PathBuf],
    output: &Path,
    config: &BuildConfig,
    encoder: &E,
    progress: Option<&EmbedProgressFn>,
    cancel: &CancelToken,
) -> Result<BuildReport, BuildError> {
    let files = read_sources(roots, &config.reader)?;
    info!(name = %config.name, files = files.len(), "starting pack build");

    // Chunk everything up front so embedding can run in uniform batches.
    let mut per_file: Vec<(NewSource, Vec<libragen_ingest::Chunk>)> = Vec::new();
    let mut total_chunks = 0usize;
    for file in &files {
        let chunks = chunk_text(&file.content, &config.chunker);
        if chunks.is_empty() {
            continue;
        }
        total_chunks += chunks.len();
        per_file.push((
            NewSource {
                path: file.path.to_string_lossy().into_owned(),
                relative_path: file.relative_path.clone(),
                language: file.language.clone(),
                size: file.size,
                modified_at: file.modified_at.map(|t| t.to_rfc3339()),
                content_hash: None,
            },
            chunks,
        ));
    }

    if total_chunks == 0 && !config.allow_empty {
        return Err(BuildError::NoChunks);
    }

    let texts: Vec<String> = per_file
        .iter()
        .flat_map(|(_, chunks)| chunks.iter().map(|c| c.content.clone()))
        .collect();
    let embeddings = encoder.embed_batch(&texts, progress, cancel).await?;
    debug!(chunks = embeddings.len(), "embedded chunk batch");

    let store = PackStore::create(output).await?;

    let mut manifest = Manifest {
        name: config.name.clone(),
        version: config.version.clone(),
        display_name: config.display_name.clone(),
        description: config.description.clone(),
        content_version: config.content_version.clone(),
        content_version_type: config.content_version_type.clone(),
        source: config.origin.clone().map(|origin| PackSource {
            origin: Some(origin),
            collection: None,
        }),
        embedding: config.embedding.clone(),
        chunking: ChunkingInfo {
            strategy: "recursive".to_string(),
            chunk_size: config.chunker.chunk_size,
            chunk_overlap: config.chunker.chunk_overlap,
        },
        ..Default::default()
    };
    store.set_manifest(&manifest).await?;

    // Insert in reader order; chunk ids follow.
    let mut offset = 0usize;
    for (source, chunks) in &per_file {
        let source_id = store.add_source(source).await?;
        let rows: Vec<NewChunk> = chunks
            .iter()
            .zip(&embeddings[offset..offset + chunks.len()])
            .map(|(chunk, embedding)| NewChunk {
                content: chunk.content.clone(),
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                embedding: embedding.clone(),
            })
            .collect();
        offset += chunks.len();
        store
            .add_chunks(source_id, &rows, config.content_version.as_deref())
            .await?;
    }

    // Finalize.
    manifest.stats = PackStats {
        chunk_count: store.count_chunks().await?,
        source_count: store.count_sources().await?,
        file_size: 0,
    };

    let content_hash = store.compute_content_hash().await?;
    store.set_meta(meta_keys::CONTENT_HASH, &content_hash).await?;
    manifest.content_hash = Some(content_hash.clone());

    if manifest.created_at.is_none() {
        manifest.created_at = Some(Utc::now());
    }

    store.optimize().await?;
    manifest.stats.file_size = store.file_size()?;
    store.set_manifest(&manifest).await?;

    let report = BuildReport {
        path: output.to_path_buf(),
        chunk_count: manifest.stats.chunk_count,
        source_count: manifest.stats.source_count,
        content_hash,
        file_size: manifest.stats.file_size,
    };
    info!(
        name = %config.name,
        chunks = report.chunk_count,
        sources = report.source_count,
        "pack build finished"
    );
    Ok(report)
}
