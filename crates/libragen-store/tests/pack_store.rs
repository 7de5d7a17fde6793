//! Integration tests exercising a real pack file on disk: schema
//! creation, transactional FTS sync, search ordering, filters, neighbor
//! queries, hash determinism, and migration backup/restore.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use libragen_store::{
    CURRENT_SCHEMA_VERSION, MIGRATIONS, Migration, NewChunk, NewSource, PackStore, SearchFilters,
    StoreError, migrate_with, meta_keys,
};

/// Deterministic unit-norm embedding from a seed.
fn synthetic_embedding(seed: u32, dims: usize) -> Vec<f32> {
    #[allow(clippy::cast_precision_loss)]
    let raw: Vec<f32> = (0..dims)
        .map(|i| ((seed as f32) / 10.0 + (i as f32) / (dims as f32)).sin())
        .collect();
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    raw.iter().map(|x| x / norm).collect()
}

fn chunk(content: &str, start: u32, end: u32, seed: u32) -> NewChunk {
    NewChunk {
        content: content.to_string(),
        start_line: start,
        end_line: end,
        embedding: synthetic_embedding(seed, 8),
    }
}

fn source(rel: &str) -> NewSource {
    NewSource {
        path: format!("/repo/{rel}"),
        relative_path: rel.to_string(),
        language: Some("rust".to_string()),
        size: 100,
        modified_at: None,
        content_hash: None,
    }
}

async fn fresh_pack(dir: &TempDir) -> PackStore {
    PackStore::create(dir.path().join("test.pack")).await.unwrap()
}

#[tokio::test]
async fn create_writes_current_schema_version() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    assert_eq!(store.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(store.count_chunks().await.unwrap(), 0);
}

#[tokio::test]
async fn open_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = PackStore::open(dir.path().join("absent.pack"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn open_non_pack_file_is_invalid_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("junk.pack");
    std::fs::write(&path, b"definitely not a database").unwrap();
    let err = PackStore::open(&path, true).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidFormat(_)));
}

#[tokio::test]
async fn open_newer_schema_is_rejected() {
    let dir = TempDir::new().unwrap();
    {
        let store = fresh_pack(&dir).await;
        store
            .set_meta(meta_keys::SCHEMA_VERSION, &(CURRENT_SCHEMA_VERSION + 5).to_string())
            .await
            .unwrap();
    }
    let err = PackStore::open(dir.path().join("test.pack"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::SchemaVersionTooNew { .. }));
}

#[tokio::test]
async fn chunk_ids_are_insertion_ordered() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    let sid = store.add_source(&source("a.rs")).await.unwrap();
    store
        .add_chunks(
            sid,
            &[chunk("first", 1, 5, 1), chunk("second", 5, 10, 2), chunk("third", 10, 15, 3)],
            None,
        )
        .await
        .unwrap();

    let first = store.get_chunk(1).await.unwrap().unwrap();
    let third = store.get_chunk(3).await.unwrap().unwrap();
    assert_eq!(first.content, "first");
    assert_eq!(third.content, "third");
    assert_eq!(first.source_file, "a.rs");
}

#[tokio::test]
async fn fts_agrees_with_chunks_after_commit() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    let sid = store.add_source(&source("a.rs")).await.unwrap();
    store
        .add_chunks(
            sid,
            &[
                chunk("the quick brown fox", 1, 1, 1),
                chunk("a zebra sleeps", 2, 2, 2),
            ],
            None,
        )
        .await
        .unwrap();

    // A literal substring present in exactly one chunk returns that chunk.
    let hits = store
        .keyword_search("zebra", 10, &SearchFilters::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.content, "a zebra sleeps");
}

#[tokio::test]
async fn keyword_search_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    let sid = store.add_source(&source("a.rs")).await.unwrap();
    store
        .add_chunks(sid, &[chunk("Factorial Function", 7, 9, 1)], None)
        .await
        .unwrap();

    let hits = store
        .keyword_search("FACTORIAL", 5, &SearchFilters::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn vector_search_ranks_self_match_first() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    let sid = store.add_source(&source("a.rs")).await.unwrap();
    store
        .add_chunks(
            sid,
            &[chunk("target", 1, 1, 1), chunk("near", 2, 2, 2), chunk("far", 3, 3, 40)],
            None,
        )
        .await
        .unwrap();

    let query = synthetic_embedding(1, 8);
    let hits = store
        .vector_search(&query, 3, &SearchFilters::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk.content, "target");
    assert!(hits[0].score > 0.999, "self-match should be ~1.0: {}", hits[0].score);
    assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
}

#[tokio::test]
async fn vector_search_truncates_to_k() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    let sid = store.add_source(&source("a.rs")).await.unwrap();
    let chunks: Vec<NewChunk> = (0..10).map(|i| chunk(&format!("c{i}"), i, i, i)).collect();
    store.add_chunks(sid, &chunks, None).await.unwrap();

    let hits = store
        .vector_search(&synthetic_embedding(0, 8), 4, &SearchFilters::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 4);
}

#[tokio::test]
async fn content_version_filter_applies_to_both_searches() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    let sid = store.add_source(&source("a.rs")).await.unwrap();
    store
        .add_chunks(sid, &[chunk("alpha feature", 1, 1, 1)], Some("1.0"))
        .await
        .unwrap();
    store
        .add_chunks(sid, &[chunk("alpha feature", 2, 2, 2)], Some("2.0"))
        .await
        .unwrap();

    let filters = SearchFilters {
        content_version: Some("1.0".to_string()),
        source_glob: None,
    };

    let kw = store.keyword_search("alpha", 10, &filters).await.unwrap();
    assert_eq!(kw.len(), 1);
    assert_eq!(kw[0].chunk.content_version.as_deref(), Some("1.0"));

    let vec = store
        .vector_search(&synthetic_embedding(1, 8), 10, &filters)
        .await
        .unwrap();
    assert_eq!(vec.len(), 1);
    assert_eq!(vec[0].chunk.content_version.as_deref(), Some("1.0"));
}

#[tokio::test]
async fn source_glob_filter_restricts_results() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    let rs = store.add_source(&source("src/lib.rs")).await.unwrap();
    let md = store.add_source(&source("README.md")).await.unwrap();
    store.add_chunks(rs, &[chunk("shared term", 1, 1, 1)], None).await.unwrap();
    store.add_chunks(md, &[chunk("shared term", 1, 1, 2)], None).await.unwrap();

    let filters = SearchFilters {
        content_version: None,
        source_glob: Some("*.md".to_string()),
    };
    let hits = store.keyword_search("shared", 10, &filters).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.source_file, "README.md");
}

#[tokio::test]
async fn neighbors_come_from_same_source_in_order() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    let a = store.add_source(&source("a.rs")).await.unwrap();
    let b = store.add_source(&source("b.rs")).await.unwrap();
    store
        .add_chunks(a, &[chunk("a1", 1, 1, 1), chunk("a2", 2, 2, 2), chunk("a3", 3, 3, 3)], None)
        .await
        .unwrap();
    store.add_chunks(b, &[chunk("b1", 1, 1, 4)], None).await.unwrap();

    // Chunk ids: a1=1, a2=2, a3=3, b1=4.
    let before = store.context_before(a, 3, 5).await.unwrap();
    assert_eq!(
        before.iter().map(|c| c.content.as_str()).collect::<Vec<_>>(),
        vec!["a1", "a2"]
    );

    let after = store.context_after(a, 1, 1).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].content, "a2");

    // Chunks from b.rs never appear as neighbors of a.rs.
    let after_a3 = store.context_after(a, 3, 5).await.unwrap();
    assert!(after_a3.is_empty());
}

#[tokio::test]
async fn content_hash_is_deterministic_and_order_sensitive() {
    let dir = TempDir::new().unwrap();
    let store = fresh_pack(&dir).await;
    let sid = store.add_source(&source("a.rs")).await.unwrap();
    store
        .add_chunks(sid, &[chunk("one", 1, 1, 1), chunk("two", 2, 2, 2)], None)
        .await
        .unwrap();

    let h1 = store.compute_content_hash().await.unwrap();
    let h2 = store.compute_content_hash().await.unwrap();
    assert_eq!(h1, h2);
    assert!(h1.starts_with("sha256:"));

    // Adding a chunk invalidates the previous hash.
    store.add_chunks(sid, &[chunk("three", 3, 3, 3)], None).await.unwrap();
    let h3 = store.compute_content_hash().await.unwrap();
    assert_ne!(h1, h3);
}

#[tokio::test]
async fn identical_content_hashes_across_separate_builds() {
    let dir = TempDir::new().unwrap();

    let mut hashes = Vec::new();
    for name in ["one.pack", "two.pack"] {
        let store = PackStore::create(dir.path().join(name)).await.unwrap();
        let sid = store.add_source(&source("a.rs")).await.unwrap();
        store
            .add_chunks(sid, &[chunk("same content", 1, 4, 9)], None)
            .await
            .unwrap();
        hashes.push(store.compute_content_hash().await.unwrap());
    }
    assert_eq!(hashes[0], hashes[1]);
}

#[tokio::test]
async fn read_only_open_refuses_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.pack");
    {
        PackStore::create(&path).await.unwrap();
    }
    let store = PackStore::open(&path, true).await.unwrap();
    let err = store.set_meta("k", "v").await;
    assert!(err.is_err(), "query_only pack should reject writes");
}

// ── Migration runner ────────────────────────────────────────────────────

/// A migration list whose last step always fails.
const FAILING_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial",
        sql: "CREATE TABLE IF NOT EXISTS library_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
              CREATE TABLE IF NOT EXISTS things (id INTEGER PRIMARY KEY);",
    },
    Migration {
        version: 2,
        description: "broken",
        sql: "THIS IS NOT SQL;",
    },
];

#[tokio::test]
async fn migration_failure_restores_original_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("old.pack");

    // Build a v1-only pack.
    {
        PackStore::create_with(&path, &FAILING_MIGRATIONS[..1]).await.unwrap();
    }
    let before = std::fs::read(&path).unwrap();

    // Migrating to the broken v2 fails and restores the file.
    let store = PackStore::open(&path, false).await.unwrap();
    let err = migrate_with(store, FAILING_MIGRATIONS).await.unwrap_err();
    assert!(matches!(err, StoreError::Migration { version: 2, .. }));

    let after = std::fs::read(&path).unwrap();
    assert_eq!(before, after, "failed migration must restore original bytes");
    assert!(!path.with_extension("pack.backup").exists());

    // Reopening still reports v1.
    let store = PackStore::open(&path, false).await.unwrap();
    assert_eq!(store.schema_version().await.unwrap(), 1);
}

#[tokio::test]
async fn migration_noop_when_current() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.pack");
    let store = PackStore::create(&path).await.unwrap();
    // Already at CURRENT_SCHEMA_VERSION: nothing to apply.
    let store = migrate_with(store, MIGRATIONS).await.unwrap();
    assert_eq!(store.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn migration_from_v1_preserves_chunks_and_ordinals() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("old.pack");

    // Build a v1 pack with data using only v1 columns.
    {
        let store = PackStore::create_with(&path, &MIGRATIONS[..1]).await.unwrap();
        store
            .connection()
            .execute_batch(
                "INSERT INTO sources (path, relative_path, size) VALUES ('/r/a.rs', 'a.rs', 10);
                 INSERT INTO chunks (source_id, content, start_line, end_line) VALUES (1, 'first', 1, 2);
                 INSERT INTO chunks (source_id, content, start_line, end_line) VALUES (1, 'second', 3, 4);
                 INSERT INTO chunks_fts (rowid, content) VALUES (1, 'first');
                 INSERT INTO chunks_fts (rowid, content) VALUES (2, 'second');",
            )
            .await
            .unwrap();
        assert_eq!(store.schema_version().await.unwrap(), 1);
    }

    // Open for write and migrate to current.
    let store = PackStore::open(&path, false).await.unwrap();
    let store = migrate_with(store, MIGRATIONS).await.unwrap();
    assert_eq!(store.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);

    // Chunks and their ordinals survive.
    let first = store.get_chunk(1).await.unwrap().unwrap();
    let second = store.get_chunk(2).await.unwrap().unwrap();
    assert_eq!(first.content, "first");
    assert_eq!(second.content, "second");
    assert_eq!(first.content_version, None);
}

#[tokio::test]
async fn migration_required_when_read_only_and_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("old.pack");
    {
        PackStore::create_with(&path, &MIGRATIONS[..1]).await.unwrap();
    }

    let store = PackStore::open(&path, true).await.unwrap();
    let err = migrate_with(store, MIGRATIONS).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::MigrationRequired { found: 1, required: CURRENT_SCHEMA_VERSION }
    ));
}
