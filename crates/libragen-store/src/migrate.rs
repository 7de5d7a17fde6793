//! Versioned schema migrations with backup/restore.
//!
//! Each migration is one SQL batch applied inside its own transaction,
//! which also bumps `library_meta["schema_version"]`. Before the first
//! pending migration runs, the pack file is copied to `<path>.backup`; on
//! success the backup is deleted, on any failure the connection is closed
//! and the backup restored byte-for-byte.
//!
//! Adding an entry to [`MIGRATIONS`] is the sole supported way to evolve
//! the pack format.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::PackStore;

/// One schema migration step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Schema version this migration produces.
    pub version: i64,
    pub description: &'static str,
    /// Statements applied inside the migration's transaction.
    pub sql: &'static str,
}

/// v1 — the historical `.libragen` layout.
const MIGRATION_001: &str = "
CREATE TABLE IF NOT EXISTS library_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    relative_path TEXT NOT NULL,
    language TEXT,
    size INTEGER NOT NULL DEFAULT 0,
    modified_at TEXT,
    content_hash TEXT
);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    content TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    content,
    content='chunks',
    content_rowid='id',
    tokenize='unicode61'
);
";

/// v2 — per-chunk content versions for version-filtered search.
const MIGRATION_002: &str = "
ALTER TABLE chunks ADD COLUMN content_version TEXT;
CREATE INDEX IF NOT EXISTS idx_chunks_content_version ON chunks(content_version);
";

/// All registered migrations, ascending by version.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema: sources, chunks, chunks_fts, library_meta",
        sql: MIGRATION_001,
    },
    Migration {
        version: 2,
        description: "add chunks.content_version",
        sql: MIGRATION_002,
    },
];

/// The schema version fresh packs are created at.
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

/// Bring `store` up to [`CURRENT_SCHEMA_VERSION`].
///
/// # Errors
///
/// See [`migrate_with`].
pub async fn migrate(store: PackStore) -> Result<PackStore, StoreError> {
    migrate_with(store, MIGRATIONS).await
}

/// Bring `store` up to the highest version in `migrations`.
///
/// Consumes the store so the underlying connection can be dropped before a
/// backup restore; returns it (same connection) once the schema is
/// current.
///
/// # Errors
///
/// - [`StoreError::SchemaVersionTooNew`] if the pack is ahead of the
///   migration list.
/// - [`StoreError::MigrationRequired`] if the store is read-only and
///   behind.
/// - [`StoreError::Migration`] if a batch fails; the pre-migration file
///   has been restored from backup.
pub async fn migrate_with(
    store: PackStore,
    migrations: &[Migration],
) -> Result<PackStore, StoreError> {
    let target = migrations.iter().map(|m| m.version).max().unwrap_or(0);
    let current = store.schema_version().await?;

    if current > target {
        return Err(StoreError::SchemaVersionTooNew {
            found: current,
            supported: target,
        });
    }
    if current == target {
        return Ok(store);
    }
    if store.is_read_only() {
        return Err(StoreError::MigrationRequired {
            found: current,
            required: target,
        });
    }

    let path = store.path().to_path_buf();
    let backup = backup_path(&path);
    std::fs::copy(&path, &backup)?;

    for migration in migrations.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            description = migration.description,
            pack = %path.display(),
            "applying migration"
        );
        let batch = format!(
            "BEGIN;\n{}\nINSERT OR REPLACE INTO library_meta (key, value) \
             VALUES ('schema_version', '{}');\nCOMMIT;",
            migration.sql, migration.version
        );
        if let Err(e) = store.connection().execute_batch(&batch).await {
            warn!(
                version = migration.version,
                error = %e,
                "migration failed, restoring backup"
            );
            // Close the connection before overwriting the file, and drop
            // any journal left behind so the restored bytes stand alone.
            drop(store);
            std::fs::copy(&backup, &path)?;
            let _ = std::fs::remove_file(&backup);
            for suffix in ["-journal", "-wal", "-shm"] {
                let _ = std::fs::remove_file(sibling(&path, suffix));
            }
            return Err(StoreError::Migration {
                version: migration.version,
                message: e.to_string(),
            });
        }
    }

    let _ = std::fs::remove_file(&backup);
    Ok(store)
}

fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".backup")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}
