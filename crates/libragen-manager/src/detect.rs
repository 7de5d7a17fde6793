//! Install-source format detection.
//!
//! Detection is explicit — extension hint first, then content sniffing —
//! so install dispatch never relies on trying one parser and catching its
//! failure.

use std::path::Path;

/// First bytes of a SQLite database (and therefore a pack).
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

/// gzip magic bytes (a `.pack-collection` archive is tar+gzip).
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// What an install source turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A single pack file.
    Pack,
    /// A tar+gzip collection archive.
    CollectionArchive,
    /// A collection definition JSON document.
    CollectionJson,
}

/// Detect what kind of install source a file is, from its extension and
/// leading bytes. `None` when it is none of the known kinds.
#[must_use]
pub fn detect_kind(path: &Path, head: &[u8]) -> Option<SourceKind> {
    if let Some(kind) = kind_from_extension(path) {
        return Some(kind);
    }
    kind_from_bytes(head)
}

fn kind_from_extension(path: &Path) -> Option<SourceKind> {
    let name = path.file_name()?.to_str()?.to_lowercase();
    if name.ends_with(".pack-collection") || name.ends_with(".libragen-collection") {
        return Some(SourceKind::CollectionArchive);
    }
    if name.ends_with(".pack") || name.ends_with(".libragen") {
        return Some(SourceKind::Pack);
    }
    if name.ends_with(".json") {
        return Some(SourceKind::CollectionJson);
    }
    None
}

fn kind_from_bytes(head: &[u8]) -> Option<SourceKind> {
    if head.starts_with(SQLITE_MAGIC) {
        return Some(SourceKind::Pack);
    }
    if head.starts_with(GZIP_MAGIC) {
        return Some(SourceKind::CollectionArchive);
    }
    if head.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
        return Some(SourceKind::CollectionJson);
    }
    None
}
