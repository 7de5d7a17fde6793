//! Build pipeline tests with a deterministic mock encoder: scenario
//! coverage for build-then-query, reproducible hashes, empty trees, and
//! cancellation cleanup.

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use libragen_build::{BuildConfig, BuildError, build_pack};
use libragen_core::cancel::CancelToken;
use libragen_core::progress::EmbedProgressFn;
use libragen_embed::{EmbedError, TextEncoder};
use libragen_store::{PackStore, SearchFilters};

const DIMS: usize = 8;

/// Deterministic encoder: a text's vector is a unit-norm function of its
/// bytes. No model, no I/O, cancel-aware like the real one.
struct HashEncoder;

fn hash_embedding(text: &str) -> Vec<f32> {
    let mut acc = [0.0f32; DIMS];
    for (i, byte) in text.bytes().enumerate() {
        acc[i % DIMS] += f32::from(byte) / 255.0;
    }
    let norm: f32 = acc.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        acc[0] = 1.0;
        return acc.to_vec();
    }
    acc.iter().map(|x| x / norm).collect()
}

impl TextEncoder for HashEncoder {
    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(hash_embedding(text))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        progress: Option<&EmbedProgressFn>,
        cancel: &CancelToken,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        if cancel.is_canceled() {
            return Err(EmbedError::Canceled);
        }
        let out: Vec<Vec<f32>> = texts.iter().map(|t| hash_embedding(t)).collect();
        if let Some(progress) = progress {
            progress(&libragen_core::progress::EmbedProgress {
                batch: 1,
                total_batches: 1,
                processed: out.len(),
                total: out.len(),
            });
        }
        Ok(out)
    }
}

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn source_dir_with_factorial() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "math.js",
        "// math helpers\n// small utilities\n// used in tests\n\nlet x = 1;\n\nfunction factorial(n) {\n  return n <= 1 ? 1 : n * factorial(n - 1);\n}\n",
    );
    dir
}

#[tokio::test]
async fn build_then_query_finds_factorial_with_line_span() {
    let src = source_dir_with_factorial();
    let out = TempDir::new().unwrap();
    let pack_path = out.path().join("math.pack");

    let report = build_pack(
        &[src.path().to_path_buf()],
        &pack_path,
        &BuildConfig::new("math-docs", "1.0.0"),
        &HashEncoder,
        None,
        &CancelToken::new(),
    )
    .await
    .unwrap();
    assert!(report.chunk_count >= 1);

    let store = PackStore::open(&pack_path, true).await.unwrap();
    let hits = store
        .keyword_search("factorial", 3, &SearchFilters::default())
        .await
        .unwrap();
    let hit = hits
        .iter()
        .find(|h| h.chunk.source_file == "math.js")
        .expect("factorial should be indexed");
    // `function factorial(n)` sits on line 7 of the fixture.
    assert!(
        hit.chunk.start_line <= 7 && 7 <= hit.chunk.end_line,
        "line 7 should fall inside {}..{}",
        hit.chunk.start_line,
        hit.chunk.end_line
    );
}

#[tokio::test]
async fn identical_inputs_produce_identical_hashes() {
    let src = source_dir_with_factorial();
    let out = TempDir::new().unwrap();

    let mut hashes = Vec::new();
    for name in ["a.pack", "b.pack"] {
        let report = build_pack(
            &[src.path().to_path_buf()],
            &out.path().join(name),
            &BuildConfig::new("math-docs", "1.0.0"),
            &HashEncoder,
            None,
            &CancelToken::new(),
        )
        .await
        .unwrap();
        hashes.push(report.content_hash);
    }
    assert_eq!(hashes[0], hashes[1]);
}

#[tokio::test]
async fn stats_match_store_counts_and_manifest_is_finalized() {
    let src = source_dir_with_factorial();
    let out = TempDir::new().unwrap();
    let pack_path = out.path().join("math.pack");

    let report = build_pack(
        &[src.path().to_path_buf()],
        &pack_path,
        &BuildConfig::new("math-docs", "1.0.0"),
        &HashEncoder,
        None,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    let store = PackStore::open(&pack_path, true).await.unwrap();
    assert_eq!(store.count_chunks().await.unwrap(), report.chunk_count);

    let manifest = store.manifest().await.unwrap().unwrap();
    assert_eq!(manifest.name, "math-docs");
    assert_eq!(manifest.stats.chunk_count, report.chunk_count);
    assert_eq!(manifest.stats.source_count, 1);
    assert!(manifest.created_at.is_some());
    assert_eq!(manifest.content_hash.as_deref(), Some(report.content_hash.as_str()));

    // The stored hash matches a recomputation.
    assert_eq!(store.compute_content_hash().await.unwrap(), report.content_hash);
}

#[tokio::test]
async fn empty_tree_fails_without_allow_empty() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pack_path = out.path().join("empty.pack");

    let err = build_pack(
        &[src.path().to_path_buf()],
        &pack_path,
        &BuildConfig::new("empty", "0.1.0"),
        &HashEncoder,
        None,
        &CancelToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BuildError::NoChunks));
    assert!(!pack_path.exists(), "failed build must not leave a pack behind");
}

#[tokio::test]
async fn empty_tree_builds_valid_pack_with_allow_empty() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pack_path = out.path().join("empty.pack");

    let config = BuildConfig {
        allow_empty: true,
        ..BuildConfig::new("empty", "0.1.0")
    };
    let report = build_pack(
        &[src.path().to_path_buf()],
        &pack_path,
        &config,
        &HashEncoder,
        None,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.chunk_count, 0);
    let store = PackStore::open(&pack_path, true).await.unwrap();
    let manifest = store.manifest().await.unwrap().unwrap();
    assert_eq!(manifest.stats.chunk_count, 0);
}

#[tokio::test]
async fn missing_source_path_fails() {
    let out = TempDir::new().unwrap();
    let err = build_pack(
        &[PathBuf::from("/no/such/source")],
        &out.path().join("x.pack"),
        &BuildConfig::new("x", "0.1.0"),
        &HashEncoder,
        None,
        &CancelToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BuildError::MissingSource(_)));
}

#[tokio::test]
async fn existing_output_is_rejected() {
    let src = source_dir_with_factorial();
    let out = TempDir::new().unwrap();
    let pack_path = out.path().join("math.pack");
    std::fs::write(&pack_path, b"occupied").unwrap();

    let err = build_pack(
        &[src.path().to_path_buf()],
        &pack_path,
        &BuildConfig::new("math-docs", "1.0.0"),
        &HashEncoder,
        None,
        &CancelToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BuildError::AlreadyExists(_)));
    // The pre-existing file is untouched.
    assert_eq!(std::fs::read(&pack_path).unwrap(), b"occupied");
}

#[tokio::test]
async fn canceled_build_leaves_no_pack() {
    let src = source_dir_with_factorial();
    let out = TempDir::new().unwrap();
    let pack_path = out.path().join("math.pack");

    let cancel = CancelToken::new();
    cancel.cancel();

    let err = build_pack(
        &[src.path().to_path_buf()],
        &pack_path,
        &BuildConfig::new("math-docs", "1.0.0"),
        &HashEncoder,
        None,
        &cancel,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BuildError::Embed(EmbedError::Canceled)));
    assert!(!pack_path.exists());
}

#[tokio::test]
async fn content_version_is_stamped_on_chunks() {
    let src = source_dir_with_factorial();
    let out = TempDir::new().unwrap();
    let pack_path = out.path().join("math.pack");

    let config = BuildConfig {
        content_version: Some("2.1.0".to_string()),
        ..BuildConfig::new("math-docs", "1.0.0")
    };
    build_pack(
        &[src.path().to_path_buf()],
        &pack_path,
        &config,
        &HashEncoder,
        None,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    let store = PackStore::open(&pack_path, true).await.unwrap();
    let chunk = store.get_chunk(1).await.unwrap().unwrap();
    assert_eq!(chunk.content_version.as_deref(), Some("2.1.0"));
}
