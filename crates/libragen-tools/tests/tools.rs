//! Tool surface tests: list with manifest fields, aggregated multi-pack
//! search, uninstall symmetry, and dry-run update planning.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use libragen_collections::{ClientOptions, CollectionClient};
use libragen_core::Manifest;
use libragen_core::cancel::CancelToken;
use libragen_core::collection::InstallScope;
use libragen_core::progress::EmbedProgressFn;
use libragen_core::paths::Paths;
use libragen_embed::{EmbedError, TextEncoder};
use libragen_manager::{PackManager, PackRoot};
use libragen_search::NoReranker;
use libragen_store::{NewChunk, NewSource, PackStore, meta_keys};
use libragen_tools::{SearchParams, UpdateParams, list_packs, search_packs, uninstall_pack, update_packs};

const DIMS: usize = 4;

/// Deterministic byte-hash encoder, same scheme across tool tests.
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
        _progress: Option<&EmbedProgressFn>,
        _cancel: &CancelToken,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| hash_embedding(t)).collect())
    }
}

async fn make_pack(dir: &Path, name: &str, description: &str, chunks: &[&str]) -> PathBuf {
    let path = dir.join(format!("{name}-1.0.0.pack"));
    let store = PackStore::create(&path).await.unwrap();
    let sid = store
        .add_source(&NewSource {
            path: format!("/src/{name}.md"),
            relative_path: format!("{name}.md"),
            ..Default::default()
        })
        .await
        .unwrap();
    let rows: Vec<NewChunk> = chunks
        .iter()
        .enumerate()
        .map(|(i, content)| NewChunk {
            content: (*content).to_string(),
            start_line: (i + 1) as u32,
            end_line: (i + 1) as u32,
            embedding: hash_embedding(content),
        })
        .collect();
    store.add_chunks(sid, &rows, None).await.unwrap();

    let manifest = Manifest {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        description: Some(description.to_string()),
        stats: libragen_core::manifest::PackStats {
            chunk_count: store.count_chunks().await.unwrap(),
            source_count: 1,
            file_size: 0,
        },
        ..Default::default()
    };
    store.set_manifest(&manifest).await.unwrap();
    let hash = store.compute_content_hash().await.unwrap();
    store.set_meta(meta_keys::CONTENT_HASH, &hash).await.unwrap();
    store.close();
    path
}

struct Fixture {
    home: TempDir,
    manager: PackManager,
    client: CollectionClient,
}

fn fixture(root: PathBuf) -> Fixture {
    let home = TempDir::new().unwrap();
    let paths = Paths::from_home(home.path());
    let client = CollectionClient::new(&paths, ClientOptions::default()).unwrap();
    let manager = PackManager::new(vec![PackRoot {
        path: root,
        scope: InstallScope::Global,
    }]);
    Fixture {
        home,
        manager,
        client,
    }
}

#[tokio::test]
async fn list_includes_manifest_fields() {
    let root = TempDir::new().unwrap();
    make_pack(root.path(), "tokio-docs", "Async runtime docs", &["spawning tasks"]).await;
    let f = fixture(root.path().to_path_buf());

    let packs = list_packs(&f.manager).await.unwrap();
    assert_eq!(packs.len(), 1);
    assert_eq!(packs[0].name, "tokio-docs");
    assert_eq!(packs[0].description.as_deref(), Some("Async runtime docs"));
    assert_eq!(packs[0].chunk_count, 1);
    drop(f.home);
}

#[tokio::test]
async fn search_aggregates_across_packs_and_trims_top_k() {
    let root = TempDir::new().unwrap();
    make_pack(
        root.path(),
        "alpha",
        "a",
        &["shared keyword one", "unrelated text"],
    )
    .await;
    make_pack(root.path(), "beta", "b", &["shared keyword two"]).await;
    let f = fixture(root.path().to_path_buf());

    let params = SearchParams {
        top_k: 2,
        context_before: 0,
        context_after: 0,
        ..SearchParams::new("shared keyword")
    };
    let hits = search_packs(
        &f.manager,
        &HashEncoder,
        None::<&NoReranker>,
        &params,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(hits.len(), 2);
    let mut libraries: Vec<&str> = hits.iter().map(|h| h.library.as_str()).collect();
    libraries.sort_unstable();
    assert_eq!(libraries, vec!["alpha", "beta"]);
    assert!(hits[0].hit.score >= hits[1].hit.score);
}

#[tokio::test]
async fn search_respects_library_filter() {
    let root = TempDir::new().unwrap();
    make_pack(root.path(), "alpha", "a", &["shared term"]).await;
    make_pack(root.path(), "beta", "b", &["shared term"]).await;
    let f = fixture(root.path().to_path_buf());

    let params = SearchParams {
        libraries: Some(vec!["beta".to_string()]),
        context_before: 0,
        context_after: 0,
        ..SearchParams::new("shared")
    };
    let hits = search_packs(
        &f.manager,
        &HashEncoder,
        None::<&NoReranker>,
        &params,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.library == "beta"));
}

#[tokio::test]
async fn uninstall_restores_prior_list() {
    let root = TempDir::new().unwrap();
    make_pack(root.path(), "alpha", "a", &["text"]).await;
    let f = fixture(root.path().to_path_buf());

    assert_eq!(list_packs(&f.manager).await.unwrap().len(), 1);
    uninstall_pack(&f.manager, "alpha").await.unwrap();
    assert!(list_packs(&f.manager).await.unwrap().is_empty());

    let err = uninstall_pack(&f.manager, "alpha").await.unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn update_dry_run_reports_candidates_without_applying() {
    let root = TempDir::new().unwrap();
    make_pack(root.path(), "alpha", "a", &["text"]).await;
    let f = fixture(root.path().to_path_buf());

    // No collection origin anywhere: nothing to update.
    let report = update_packs(
        &f.manager,
        &f.client,
        &UpdateParams {
            dry_run: true,
            ..Default::default()
        },
        &CancelToken::new(),
    )
    .await
    .unwrap();
    assert!(report.candidates.is_empty());
    assert!(report.updated.is_empty());
}

#[tokio::test]
async fn update_unknown_name_errors() {
    let root = TempDir::new().unwrap();
    let f = fixture(root.path().to_path_buf());

    let err = update_packs(
        &f.manager,
        &f.client,
        &UpdateParams {
            name: Some("ghost".to_string()),
            ..Default::default()
        },
        &CancelToken::new(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.exit_code(), 1);
}
