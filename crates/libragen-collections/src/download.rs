//! Hash-verified streaming downloads.
//!
//! Bytes stream into a temp file next to the destination while a SHA-256
//! runs incrementally. The temp file only becomes the destination after
//! the hash checks out; on mismatch or cancel it is dropped, so the
//! destination path never holds partial or corrupt bytes.

use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use libragen_core::cancel::CancelToken;
use libragen_core::progress::{DownloadProgress, DownloadProgressFn};

use crate::error::CollectionError;

/// Download `url` to `dest`, verifying against `expected_hash`
/// (`"sha256:<hex>"`) when given.
///
/// # Errors
///
/// - [`CollectionError::Transport`] on connection failure, timeout, or a
///   non-success status.
/// - [`CollectionError::HashMismatch`] when the bytes do not match; no
///   file is left at `dest`.
/// - [`CollectionError::Canceled`] when the token fires mid-stream.
pub async fn download(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_hash: Option<&str>,
    progress: Option<&DownloadProgressFn>,
    cancel: &CancelToken,
) -> Result<(), CollectionError> {
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(CollectionError::Transport(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }
    let total = response.content_length();

    let dest_dir = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dest_dir)?;
    let mut temp = tempfile::NamedTempFile::new_in(dest_dir)?;

    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut response = response;
    while let Some(bytes) = response.chunk().await? {
        if cancel.is_canceled() {
            return Err(CollectionError::Canceled);
        }
        hasher.update(&bytes);
        temp.write_all(&bytes)?;
        downloaded += bytes.len() as u64;
        if let Some(progress) = progress {
            progress(&DownloadProgress::new(downloaded, total));
        }
    }

    let actual = format!("sha256:{:x}", hasher.finalize());
    if let Some(expected) = expected_hash {
        if !hashes_match(expected, &actual) {
            warn!(url, expected, actual = %actual, "download hash mismatch");
            return Err(CollectionError::HashMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
    }

    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| CollectionError::Io(e.error))?;
    debug!(url, dest = %dest.display(), bytes = downloaded, "download complete");
    Ok(())
}

/// Compare a declared hash against a computed `sha256:<hex>` value.
/// Declared hashes may omit the `sha256:` prefix; hex is
/// case-insensitive.
fn hashes_match(expected: &str, actual: &str) -> bool {
    let normalize = |h: &str| h.trim_start_matches("sha256:").to_lowercase();
    normalize(expected) == normalize(actual)
}
