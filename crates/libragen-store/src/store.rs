//! The pack store: one SQLite file holding sources, chunks, embeddings,
//! the FTS5 index, and key/value metadata.
//!
//! Chunk ids are `AUTOINCREMENT`, so insertion order is the authoritative
//! ordinal: neighbor context queries and the canonical content-hash
//! projection both iterate by ascending id. `chunks_fts` rows are written
//! in the same transaction as their `chunks` rows, so the two tables agree
//! after every commit.
//!
//! Vector search is exact cosine over the stored BLOBs; vectors are
//! L2-normalized at embedding time, so the score is a plain dot product.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};

use libsql::Builder;
use sha2::{Digest, Sha256};
use tracing::debug;

use libragen_core::Manifest;

use crate::error::StoreError;
use crate::meta_keys;
use crate::migrate::{self, CURRENT_SCHEMA_VERSION};

/// First bytes of every SQLite database file.
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

/// Field separator in the canonical content-hash projection.
const HASH_FIELD_SEP: u8 = 0x1f;

/// Record separator in the canonical content-hash projection.
const HASH_RECORD_SEP: u8 = 0x1e;

/// A source file recorded during ingest.
#[derive(Debug, Clone, Default)]
pub struct NewSource {
    pub path: String,
    pub relative_path: String,
    pub language: Option<String>,
    pub size: u64,
    /// RFC 3339 modification time.
    pub modified_at: Option<String>,
    pub content_hash: Option<String>,
}

/// A chunk ready for insertion.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Unit-norm embedding, `dimensions` f32 values.
    pub embedding: Vec<f32>,
}

/// A chunk row read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRow {
    pub id: i64,
    pub source_id: i64,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content_version: Option<String>,
    /// Relative path of the owning source file.
    pub source_file: String,
    pub language: Option<String>,
}

/// A chunk row with a retrieval score attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: ChunkRow,
    /// Cosine similarity for vector search, `-bm25` for keyword search.
    pub score: f64,
}

/// Filters shared by vector and keyword search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Equality filter on `chunks.content_version`.
    pub content_version: Option<String>,
    /// SQLite `GLOB` pattern over `sources.relative_path`.
    pub source_glob: Option<String>,
}

/// An open pack file.
#[derive(Debug)]
pub struct PackStore {
    // The Database must outlive its connections.
    _db: libsql::Database,
    conn: libsql::Connection,
    path: PathBuf,
    read_only: bool,
}

impl PackStore {
    /// Create a fresh pack at `path` and initialize it at
    /// [`CURRENT_SCHEMA_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be created or the schema
    /// migrations fail.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self::open_inner(path.as_ref(), false, false).await?;
        migrate::migrate(store).await
    }

    /// Create a fresh pack and apply an explicit migration list instead of
    /// the registered one. Used by migration tests and snapshot tooling.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be created or a
    /// migration fails.
    pub async fn create_with(
        path: impl AsRef<Path>,
        migrations: &[crate::Migration],
    ) -> Result<Self, StoreError> {
        let store = Self::open_inner(path.as_ref(), false, false).await?;
        migrate::migrate_with(store, migrations).await
    }

    /// Open an existing pack.
    ///
    /// Read-only opens set `PRAGMA query_only`; writable opens force
    /// `journal_mode = DELETE` so the pack stays a single file.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if `path` does not exist.
    /// - [`StoreError::InvalidFormat`] if it is not a pack.
    /// - [`StoreError::SchemaVersionTooNew`] if the pack was written by a
    ///   newer engine.
    pub async fn open(path: impl AsRef<Path>, read_only: bool) -> Result<Self, StoreError> {
        let store = Self::open_inner(path.as_ref(), read_only, true).await?;
        let version = store.schema_version().await?;
        if version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersionTooNew {
                found: version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        Ok(store)
    }

    async fn open_inner(
        path: &Path,
        read_only: bool,
        must_exist: bool,
    ) -> Result<Self, StoreError> {
        if must_exist {
            if !path.exists() {
                return Err(StoreError::NotFound(path.to_path_buf()));
            }
            check_sqlite_magic(path)?;
        } else {
            // Materialize the file up front; SQLite writes lazily, but
            // the migration runner needs something to back up.
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
        }

        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // PRAGMAs report a result row; run them through query.
        if read_only {
            conn.query("PRAGMA query_only = ON", ()).await?;
        } else {
            conn.query("PRAGMA journal_mode = DELETE", ()).await?;
        }

        let store = Self {
            _db: db,
            conn,
            path: path.to_path_buf(),
            read_only,
        };

        if must_exist && !store.has_table("library_meta").await? {
            return Err(StoreError::InvalidFormat(format!(
                "{}: missing library_meta table",
                path.display()
            )));
        }

        Ok(store)
    }

    /// Path of the underlying pack file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Raw connection access for migrations and diagnostics.
    #[must_use]
    pub const fn connection(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Close the pack. Dropping has the same effect; this makes the
    /// intent explicit at call sites.
    pub fn close(self) {
        drop(self);
    }

    // ── Metadata ────────────────────────────────────────────────────────

    /// Schema version from `library_meta`; 0 when absent (pre-versioned
    /// or empty file).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on query failure.
    pub async fn schema_version(&self) -> Result<i64, StoreError> {
        if !self.has_table("library_meta").await? {
            return Ok(0);
        }
        match self.get_meta(meta_keys::SCHEMA_VERSION).await? {
            Some(raw) => raw.parse().map_err(|_| {
                StoreError::InvalidFormat(format!("non-integer schema_version: {raw}"))
            }),
            None => Ok(0),
        }
    }

    /// Read one `library_meta` value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on query failure.
    pub async fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT value FROM library_meta WHERE key = ?1", [key])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    /// Write one `library_meta` value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on failure.
    pub async fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO library_meta (key, value) VALUES (?1, ?2)",
                libsql::params![key, value],
            )
            .await?;
        Ok(())
    }

    /// The pack manifest, if one has been written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Manifest`] if the stored JSON is invalid.
    pub async fn manifest(&self) -> Result<Option<Manifest>, StoreError> {
        match self.get_meta(meta_keys::MANIFEST).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on serialization or SQL failure.
    pub async fn set_manifest(&self, manifest: &Manifest) -> Result<(), StoreError> {
        let json = serde_json::to_string(manifest)?;
        self.set_meta(meta_keys::MANIFEST, &json).await
    }

    // ── Ingest ──────────────────────────────────────────────────────────

    /// Insert a source row, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on failure.
    pub async fn add_source(&self, source: &NewSource) -> Result<i64, StoreError> {
        self.conn
            .execute(
                "INSERT INTO sources (path, relative_path, language, size, modified_at, content_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    source.path.as_str(),
                    source.relative_path.as_str(),
                    opt_text(source.language.as_deref()),
                    i64::try_from(source.size).unwrap_or(i64::MAX),
                    opt_text(source.modified_at.as_deref()),
                    opt_text(source.content_hash.as_deref()),
                ],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert chunks and their FTS rows in one transaction.
    ///
    /// Chunk ids are assigned in slice order. All embeddings in the batch
    /// must share one dimension.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Dimension`] on ragged embeddings.
    /// - [`StoreError::Sql`] on insert failure (the transaction rolls
    ///   back; `chunks` and `chunks_fts` stay in agreement).
    pub async fn add_chunks(
        &self,
        source_id: i64,
        chunks: &[NewChunk],
        content_version: Option<&str>,
    ) -> Result<usize, StoreError> {
        let Some(first) = chunks.first() else {
            return Ok(0);
        };
        let dim = first.embedding.len();
        for chunk in chunks {
            if chunk.embedding.len() != dim {
                return Err(StoreError::Dimension {
                    expected: dim,
                    got: chunk.embedding.len(),
                });
            }
        }

        let tx = self.conn.transaction().await?;
        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (source_id, content, start_line, end_line, content_version, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    source_id,
                    chunk.content.as_str(),
                    i64::from(chunk.start_line),
                    i64::from(chunk.end_line),
                    opt_text(content_version),
                    libsql::Value::Blob(embedding_to_bytes(&chunk.embedding)),
                ],
            )
            .await?;
            let id = self.conn.last_insert_rowid();
            tx.execute(
                "INSERT INTO chunks_fts (rowid, content) VALUES (?1, ?2)",
                libsql::params![id, chunk.content.as_str()],
            )
            .await?;
        }
        tx.commit().await?;
        debug!(source_id, count = chunks.len(), "inserted chunks");
        Ok(chunks.len())
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Fetch one chunk by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on query failure.
    pub async fn get_chunk(&self, id: i64) -> Result<Option<ChunkRow>, StoreError> {
        let sql = format!("{CHUNK_SELECT} WHERE c.id = ?1");
        let mut rows = self.conn.query(&sql, [id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_chunk(&row)?)),
            None => Ok(None),
        }
    }

    /// Up to `n` chunks from the same source strictly before `chunk_id`,
    /// in source order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on query failure.
    pub async fn context_before(
        &self,
        source_id: i64,
        chunk_id: i64,
        n: usize,
    ) -> Result<Vec<ChunkRow>, StoreError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{CHUNK_SELECT} WHERE c.source_id = ?1 AND c.id < ?2 ORDER BY c.id DESC LIMIT ?3"
        );
        let mut rows = self
            .conn
            .query(
                &sql,
                libsql::params![source_id, chunk_id, i64::try_from(n).unwrap_or(i64::MAX)],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_chunk(&row)?);
        }
        out.reverse();
        Ok(out)
    }

    /// Up to `n` chunks from the same source strictly after `chunk_id`,
    /// in source order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on query failure.
    pub async fn context_after(
        &self,
        source_id: i64,
        chunk_id: i64,
        n: usize,
    ) -> Result<Vec<ChunkRow>, StoreError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{CHUNK_SELECT} WHERE c.source_id = ?1 AND c.id > ?2 ORDER BY c.id ASC LIMIT ?3"
        );
        let mut rows = self
            .conn
            .query(
                &sql,
                libsql::params![source_id, chunk_id, i64::try_from(n).unwrap_or(i64::MAX)],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_chunk(&row)?);
        }
        Ok(out)
    }

    /// Total chunk count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on query failure.
    pub async fn count_chunks(&self) -> Result<u64, StoreError> {
        self.count("SELECT COUNT(*) FROM chunks").await
    }

    /// Total source count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on query failure.
    pub async fn count_sources(&self) -> Result<u64, StoreError> {
        self.count("SELECT COUNT(*) FROM sources").await
    }

    // ── Search ──────────────────────────────────────────────────────────

    /// Exact cosine similarity search, best `k` by descending score, ties
    /// broken by ascending id.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Dimension`] if a stored embedding does not match
    ///   the query's dimension.
    /// - [`StoreError::Sql`] on query failure.
    pub async fn vector_search(
        &self,
        query: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if k == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!("{CHUNK_SELECT_EMBEDDING} WHERE c.embedding IS NOT NULL");
        let mut params: Vec<libsql::Value> = Vec::new();
        push_filters(&mut sql, &mut params, filters);

        let mut rows = self
            .conn
            .query(&sql, libsql::params_from_iter(params))
            .await?;

        // Min-heap of the k best seen so far; the root is the candidate
        // to evict (lowest score, then highest id).
        let mut heap: BinaryHeap<Reverse<RankedChunk>> = BinaryHeap::with_capacity(k + 1);
        while let Some(row) = rows.next().await? {
            let chunk = row_to_chunk(&row)?;
            let blob = row.get::<Vec<u8>>(8)?;
            let embedding = embedding_from_bytes(&blob)?;
            if embedding.len() != query.len() {
                return Err(StoreError::Dimension {
                    expected: query.len(),
                    got: embedding.len(),
                });
            }
            let score = f64::from(dot(query, &embedding));
            heap.push(Reverse(RankedChunk { score, chunk }));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut ranked: Vec<RankedChunk> = heap.into_iter().map(|r| r.0).collect();
        ranked.sort_by(|a, b| b.cmp(a));
        Ok(ranked
            .into_iter()
            .map(|r| ScoredChunk {
                score: r.score,
                chunk: r.chunk,
            })
            .collect())
    }

    /// BM25 keyword search over `chunks_fts`.
    ///
    /// The query is tokenized with the same rules as indexing (lowercase,
    /// Unicode word boundaries) and joined into an OR match expression.
    /// Scores are `-bm25`, so higher is better.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on query failure.
    pub async fn keyword_search(
        &self,
        query: &str,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let match_expr = build_match_expr(query);
        if match_expr.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "{CHUNK_SELECT_BM25} WHERE chunks_fts MATCH ?1"
        );
        let mut params: Vec<libsql::Value> = vec![match_expr.into()];
        push_filters(&mut sql, &mut params, filters);
        sql.push_str(" ORDER BY bm25(chunks_fts) ASC, c.id ASC LIMIT ?");
        sql.push_str(&(params.len() + 1).to_string());
        params.push((i64::try_from(k).unwrap_or(i64::MAX)).into());

        let mut rows = self
            .conn
            .query(&sql, libsql::params_from_iter(params))
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let chunk = row_to_chunk(&row)?;
            let bm25 = row.get::<f64>(8)?;
            out.push(ScoredChunk {
                chunk,
                score: -bm25,
            });
        }
        Ok(out)
    }

    // ── Integrity & finalization ────────────────────────────────────────

    /// SHA-256 over the canonical chunk projection, id-ascending:
    /// `content ␟ source_file ␟ start_line ␟ end_line ␞` per chunk.
    /// Deterministic for a given chunk set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on query failure.
    pub async fn compute_content_hash(&self) -> Result<String, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.content, s.relative_path, c.start_line, c.end_line
                 FROM chunks c
                 JOIN sources s ON s.id = c.source_id
                 ORDER BY c.id ASC",
                (),
            )
            .await?;

        let mut hasher = Sha256::new();
        while let Some(row) = rows.next().await? {
            hasher.update(row.get::<String>(0)?.as_bytes());
            hasher.update([HASH_FIELD_SEP]);
            hasher.update(row.get::<String>(1)?.as_bytes());
            hasher.update([HASH_FIELD_SEP]);
            hasher.update(row.get::<i64>(2)?.to_string().as_bytes());
            hasher.update([HASH_FIELD_SEP]);
            hasher.update(row.get::<i64>(3)?.to_string().as_bytes());
            hasher.update([HASH_RECORD_SEP]);
        }
        Ok(format!("sha256:{:x}", hasher.finalize()))
    }

    /// Compact the pack into a single file (checkpoint + VACUUM).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sql`] on failure.
    pub async fn optimize(&self) -> Result<(), StoreError> {
        self.conn.query("PRAGMA wal_checkpoint(TRUNCATE)", ()).await?;
        self.conn.execute("VACUUM", ()).await?;
        Ok(())
    }

    /// Size of the pack file in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be stat'd.
    pub fn file_size(&self) -> Result<u64, StoreError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    // ── Internals ───────────────────────────────────────────────────────

    async fn has_table(&self, name: &str) -> Result<bool, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                [name],
            )
            .await?;
        let row = rows.next().await?.ok_or_else(|| {
            StoreError::InvalidFormat("sqlite_master query returned no rows".to_string())
        })?;
        Ok(row.get::<i64>(0)? > 0)
    }

    async fn count(&self, sql: &str) -> Result<u64, StoreError> {
        let mut rows = self.conn.query(sql, ()).await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::InvalidFormat("count query returned no rows".to_string()))?;
        let n = row.get::<i64>(0)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

/// Common SELECT for chunk rows joined to their source.
const CHUNK_SELECT: &str = "SELECT c.id, c.source_id, c.content, c.start_line, c.end_line, \
     c.content_version, s.relative_path, s.language \
     FROM chunks c JOIN sources s ON s.id = c.source_id";

/// Chunk SELECT with the embedding blob appended (column 8).
const CHUNK_SELECT_EMBEDDING: &str = "SELECT c.id, c.source_id, c.content, c.start_line, c.end_line, \
     c.content_version, s.relative_path, s.language, c.embedding \
     FROM chunks c JOIN sources s ON s.id = c.source_id";

/// Chunk SELECT driven by the FTS table, with `bm25` appended (column 8).
const CHUNK_SELECT_BM25: &str = "SELECT c.id, c.source_id, c.content, c.start_line, c.end_line, \
     c.content_version, s.relative_path, s.language, bm25(chunks_fts) \
     FROM chunks_fts \
     JOIN chunks c ON c.id = chunks_fts.rowid \
     JOIN sources s ON s.id = c.source_id";

fn row_to_chunk(row: &libsql::Row) -> Result<ChunkRow, StoreError> {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    Ok(ChunkRow {
        id: row.get::<i64>(0)?,
        source_id: row.get::<i64>(1)?,
        content: row.get::<String>(2)?,
        start_line: row.get::<i64>(3)? as u32,
        end_line: row.get::<i64>(4)? as u32,
        content_version: row.get::<Option<String>>(5)?,
        source_file: row.get::<String>(6)?,
        language: row.get::<Option<String>>(7)?,
    })
}

fn opt_text(value: Option<&str>) -> libsql::Value {
    value.map_or(libsql::Value::Null, |v| {
        libsql::Value::Text(v.to_string())
    })
}

/// Append filter clauses (numbered after the existing params) to `sql`.
fn push_filters(sql: &mut String, params: &mut Vec<libsql::Value>, filters: &SearchFilters) {
    if let Some(ref version) = filters.content_version {
        params.push(version.clone().into());
        sql.push_str(&format!(" AND c.content_version = ?{}", params.len()));
    }
    if let Some(ref glob) = filters.source_glob {
        params.push(glob.clone().into());
        sql.push_str(&format!(" AND s.relative_path GLOB ?{}", params.len()));
    }
}

/// Tokenize text the way the FTS index does: lowercase, split on Unicode
/// word boundaries (non-alphanumeric runs), duplicates removed in order.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut tokens = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        let token = raw.to_lowercase();
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }
    tokens
}

/// Build an FTS5 OR expression from query text. Empty for queries with no
/// word characters.
fn build_match_expr(query: &str) -> String {
    tokenize(query)
        .into_iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Encode an embedding as little-endian f32 bytes.
#[must_use]
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into an embedding.
///
/// # Errors
///
/// Returns [`StoreError::InvalidFormat`] when the byte length is not a
/// multiple of 4.
pub fn embedding_from_bytes(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::InvalidFormat(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_sqlite_magic(path: &Path) -> Result<(), StoreError> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; 16];
    let n = file.read(&mut header)?;
    // A zero-length file is a database SQLite has not written yet.
    if n == 0 {
        return Ok(());
    }
    if header[..n] != SQLITE_MAGIC[..n.min(SQLITE_MAGIC.len())] {
        return Err(StoreError::InvalidFormat(format!(
            "{}: not a SQLite file",
            path.display()
        )));
    }
    Ok(())
}

/// Heap entry ordering: "less" means worse — lower score, then (on equal
/// scores) higher id, so ascending-id determinism survives eviction.
struct RankedChunk {
    score: f64,
    chunk: ChunkRow,
}

impl PartialEq for RankedChunk {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.chunk.id == other.chunk.id
    }
}

impl Eq for RankedChunk {}

impl PartialOrd for RankedChunk {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedChunk {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.chunk.id.cmp(&self.chunk.id))
    }
}
