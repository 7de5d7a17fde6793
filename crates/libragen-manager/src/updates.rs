//! Update planning against collection indexes.
//!
//! A pack is update-eligible when its manifest records the collection it
//! was installed from and that collection's index lists a strictly newer
//! version (or `force` is set). Applying an update never disturbs the
//! current install on failure: the new pack downloads to a temp path and
//! only a successful verified install replaces the old file.

use tracing::{debug, warn};

use libragen_collections::CollectionClient;
use libragen_core::cancel::CancelToken;
use libragen_core::collection::{IndexEntry, InstalledPack};
use libragen_core::version::is_newer;
use libragen_store::PackStore;

use crate::error::ManagerError;
use crate::manager::{InstallOptions, PackManager};

/// One available update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCandidate {
    pub name: String,
    pub current_version: String,
    pub new_version: String,
    pub current_content_version: Option<String>,
    pub new_content_version: Option<String>,
    pub entry: IndexEntry,
}

/// Find update candidates for the given installed packs.
///
/// Packs without a collection origin are skipped; packs whose pack file
/// cannot be read are skipped with a warning.
///
/// # Errors
///
/// Returns [`ManagerError::Collection`] when an index fetch fails.
pub async fn find_updates(
    installed: &[InstalledPack],
    client: &CollectionClient,
    force: bool,
) -> Result<Vec<UpdateCandidate>, ManagerError> {
    let mut candidates = Vec::new();

    for pack in installed {
        let origin = match collection_origin(pack).await {
            Ok(Some(origin)) => origin,
            Ok(None) => continue,
            Err(e) => {
                warn!(name = %pack.name, error = %e, "cannot read pack origin, skipping");
                continue;
            }
        };
        debug!(name = %pack.name, collection = %origin, "checking for updates");

        let Some(entry) = client.get_entry(&pack.name, None).await? else {
            continue;
        };

        if force || is_newer(&entry.version.version, &pack.version) {
            candidates.push(UpdateCandidate {
                name: pack.name.clone(),
                current_version: pack.version.clone(),
                new_version: entry.version.version.clone(),
                current_content_version: pack.content_version.clone(),
                new_content_version: entry.version.content_version.clone(),
                entry,
            });
        }
    }

    Ok(candidates)
}

/// Download and install one update candidate. The current installation is
/// untouched unless the verified install succeeds.
///
/// # Errors
///
/// Returns [`ManagerError`] on download, verification, or install
/// failure.
pub async fn perform_update(
    candidate: &UpdateCandidate,
    manager: &PackManager,
    client: &CollectionClient,
    cancel: &CancelToken,
) -> Result<InstalledPack, ManagerError> {
    let staging = tempfile::tempdir()?;
    let staged = staging
        .path()
        .join(format!("{}-{}.pack", candidate.name, candidate.new_version));

    let verify_hash = candidate.entry.version.content_hash.is_some();
    client
        .download_entry(&candidate.entry, &staged, verify_hash, None, cancel)
        .await?;

    // Replace in the root that currently holds the pack.
    let target_root = manager
        .find(&candidate.name)
        .await?
        .and_then(|p| p.path.parent().map(std::path::Path::to_path_buf));

    let options = InstallOptions {
        force: true,
        target_root,
        ..Default::default()
    };
    manager.install_pack_file(&staged, &options).await
}

/// The collection a pack was installed from, per its manifest.
async fn collection_origin(pack: &InstalledPack) -> Result<Option<String>, ManagerError> {
    let store = PackStore::open(&pack.path, true).await?;
    let manifest = store.manifest().await?;
    Ok(manifest.and_then(|m| m.source).and_then(|s| s.collection))
}
