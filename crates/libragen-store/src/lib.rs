//! # libragen-store
//!
//! Single-file pack storage on libSQL (C SQLite fork): `sources` and
//! `chunks` tables, a `chunks_fts` FTS5 virtual table kept in sync
//! transactionally, embedding vectors as little-endian f32 BLOBs, and a
//! `library_meta` key/value table carrying the manifest, schema version,
//! and content hash.
//!
//! Schema evolution goes through [`migrate`]: versioned SQL batches with a
//! file backup taken before the first pending migration and restored on
//! any failure.

mod error;
mod migrate;
mod store;

pub use error::StoreError;
pub use migrate::{CURRENT_SCHEMA_VERSION, MIGRATIONS, Migration, migrate, migrate_with};
pub use store::{
    ChunkRow, NewChunk, NewSource, PackStore, ScoredChunk, SearchFilters, embedding_from_bytes,
    embedding_to_bytes, tokenize,
};

/// Well-known `library_meta` keys.
pub mod meta_keys {
    pub const SCHEMA_VERSION: &str = "schema_version";
    pub const MANIFEST: &str = "manifest";
    pub const CONTENT_HASH: &str = "content_hash";
}
