//! The pack manifest: structured metadata embedded in every pack.
//!
//! Stored as JSON under the `manifest` key of the pack's `library_meta`
//! table. All fields are `#[serde(default)]` so packs written by newer
//! engines (with fields this version does not know) still deserialize;
//! serde ignores unknown keys by default, which gives forward
//! compatibility in the other direction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata record embedded in a pack under `library_meta["manifest"]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Unique pack name (case-sensitive).
    pub name: String,

    /// Pack version, nominally semver.
    pub version: String,

    /// Human-facing display name.
    #[serde(default)]
    pub display_name: Option<String>,

    /// Short description of the corpus.
    #[serde(default)]
    pub description: Option<String>,

    /// Longer description aimed at AI agents deciding whether to search
    /// this pack.
    #[serde(default)]
    pub agent_description: Option<String>,

    /// Example natural-language queries this pack answers well.
    #[serde(default)]
    pub example_queries: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Programming languages present in the corpus.
    #[serde(default)]
    pub programming_languages: Vec<String>,

    /// Natural languages present in the corpus.
    #[serde(default)]
    pub text_languages: Vec<String>,

    #[serde(default)]
    pub frameworks: Vec<String>,

    #[serde(default)]
    pub licenses: Vec<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub repository: Option<String>,

    /// Where this pack came from (ingest root, collection it was
    /// installed from).
    #[serde(default)]
    pub source: Option<PackSource>,

    /// RFC 3339 creation timestamp, set once at finalization.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub embedding: EmbeddingInfo,

    #[serde(default)]
    pub chunking: ChunkingInfo,

    #[serde(default)]
    pub stats: PackStats,

    /// Version of the *content* (e.g. `"1.74.0"` for stdlib docs), as
    /// opposed to the pack version.
    #[serde(default)]
    pub content_version: Option<String>,

    /// How `content_version` compares: `"semver"`, `"date"`, or `"opaque"`.
    #[serde(default)]
    pub content_version_type: Option<String>,

    /// `sha256:<hex>` over the canonical chunk projection. Mirrors
    /// `library_meta["content_hash"]`.
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// Origin of a pack's content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackSource {
    /// Source-of-truth origin (repository URL, docs site, local path).
    #[serde(default)]
    pub origin: Option<String>,

    /// Name of the collection this pack was installed from, if any.
    #[serde(default)]
    pub collection: Option<String>,
}

/// Embedding model configuration a pack was built with.
///
/// Queries against the pack must use the same model; the searcher compares
/// this record against its encoder before running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingInfo {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_quantization")]
    pub quantization: String,
}

impl Default for EmbeddingInfo {
    fn default() -> Self {
        Self {
            model: default_model(),
            dimensions: default_dimensions(),
            quantization: default_quantization(),
        }
    }
}

/// Chunking configuration a pack was built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingInfo {
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingInfo {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Counts written at finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackStats {
    #[serde(default)]
    pub chunk_count: u64,

    #[serde(default)]
    pub source_count: u64,

    /// Pack file size in bytes, measured after the final flush.
    #[serde(default)]
    pub file_size: u64,
}

fn default_model() -> String {
    "bge-small-en-v1.5".to_string()
}

const fn default_dimensions() -> usize {
    384
}

fn default_quantization() -> String {
    "q8".to_string()
}

fn default_strategy() -> String {
    "recursive".to_string()
}

const fn default_chunk_size() -> usize {
    1000
}

const fn default_chunk_overlap() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn roundtrip_preserves_fields() {
        let manifest = Manifest {
            name: "tokio-docs".to_string(),
            version: "1.2.0".to_string(),
            description: Some("Tokio documentation".to_string()),
            keywords: vec!["async".to_string(), "runtime".to_string()],
            content_version: Some("1.40.0".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest, back);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let json = r#"{
            "name": "x",
            "version": "0.1.0",
            "some_future_field": {"nested": true}
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.name, "x");
        assert_eq!(manifest.embedding.dimensions, 384);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let manifest: Manifest = serde_json::from_str(r#"{"name":"a","version":"1"}"#).unwrap();
        assert_eq!(manifest.embedding.model, "bge-small-en-v1.5");
        assert_eq!(manifest.chunking.chunk_size, 1000);
        assert_eq!(manifest.chunking.chunk_overlap, 100);
        assert_eq!(manifest.stats.chunk_count, 0);
    }
}
