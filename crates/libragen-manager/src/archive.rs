//! Collection archive (tar+gzip) extraction.
//!
//! An archive must contain `collection.json` at its root and one or more
//! pack files. Entries are unpacked into a caller-owned directory; paths
//! are sanitized by the `tar` crate's `unpack_in`.

use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;

use libragen_core::collection::CollectionSpec;

use crate::error::ManagerError;

/// Canonical and historical archive extensions.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["pack-collection", "libragen-collection"];

/// Extract a collection archive into `dest_dir`.
///
/// Returns the parsed `collection.json` and the extracted pack file
/// paths, sorted by file name.
///
/// # Errors
///
/// Returns [`ManagerError::InvalidFormat`] when the archive is not
/// tar+gzip, has no `collection.json`, or contains no pack files.
pub fn extract_collection_archive(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<(CollectionSpec, Vec<PathBuf>), ManagerError> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    archive.unpack(dest_dir).map_err(|e| {
        ManagerError::InvalidFormat(format!(
            "{}: not a tar+gzip archive: {e}",
            archive_path.display()
        ))
    })?;

    let spec_path = dest_dir.join("collection.json");
    if !spec_path.exists() {
        return Err(ManagerError::InvalidFormat(format!(
            "{}: archive has no collection.json at its root",
            archive_path.display()
        )));
    }
    let spec: CollectionSpec = serde_json::from_str(&std::fs::read_to_string(&spec_path)?)?;

    let mut packs: Vec<PathBuf> = std::fs::read_dir(dest_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "pack" || e == "libragen")
        })
        .collect();
    packs.sort();

    if packs.is_empty() {
        return Err(ManagerError::InvalidFormat(format!(
            "{}: archive contains no pack files",
            archive_path.display()
        )));
    }

    debug!(
        archive = %archive_path.display(),
        packs = packs.len(),
        "extracted collection archive"
    );
    Ok((spec, packs))
}
