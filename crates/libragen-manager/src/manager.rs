//! The pack manager: ordered roots, atomic installs, listing, removal,
//! and integrity verification.
//!
//! Every file that lands in a pack root goes through
//! write-temp → fsync → rename, so a root never holds a half-written
//! pack. Collection installs are best-effort per item: one failure is
//! recorded and the rest proceed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use libragen_collections::{CollectionClient, ResolvedItem};
use libragen_core::cancel::CancelToken;
use libragen_core::collection::{InstallScope, InstalledPack};
use libragen_core::paths::Paths;
use libragen_core::progress::DownloadProgressFn;
use libragen_store::{PackStore, meta_keys};

use crate::archive::extract_collection_archive;
use crate::detect::{SourceKind, detect_kind};
use crate::error::ManagerError;

/// One directory holding installed packs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRoot {
    pub path: PathBuf,
    pub scope: InstallScope,
}

/// Options for install operations.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Replace an existing pack with the same name.
    pub force: bool,
    /// Explicit target root; defaults to the highest-priority root.
    pub target_root: Option<PathBuf>,
    /// Install optional collection items too.
    pub include_optional: bool,
    /// Labels of optional items to install (overrides `include_optional`
    /// per item).
    pub select_optional: Vec<String>,
}

/// What an install produced.
#[derive(Debug)]
pub enum InstallOutcome {
    Pack(InstalledPack),
    Collection(CollectionInstallReport),
}

/// Result of a best-effort collection install.
#[derive(Debug, Default)]
pub struct CollectionInstallReport {
    pub collection: String,
    pub installed: Vec<InstalledPack>,
    /// Labels of optional items that were not selected.
    pub skipped: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

/// One item that failed during a collection install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub name: String,
    pub error: String,
}

/// A collection resolved but not installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPreview {
    pub name: String,
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

/// Manager over one or more ordered pack roots (leftmost wins).
pub struct PackManager {
    roots: Vec<PackRoot>,
}

impl PackManager {
    #[must_use]
    pub fn new(roots: Vec<PackRoot>) -> Self {
        Self { roots }
    }

    /// Standard root layout: the project `.libragen/libraries` dir (when
    /// present under `cwd`) ahead of the global libraries dir.
    #[must_use]
    pub fn discover(paths: &Paths, cwd: &Path) -> Self {
        let mut roots = Vec::new();
        if let Some(project) = Paths::project_libraries_dir(cwd) {
            roots.push(PackRoot {
                path: project,
                scope: InstallScope::Project,
            });
        }
        roots.push(PackRoot {
            path: paths.libraries_dir(),
            scope: InstallScope::Global,
        });
        Self::new(roots)
    }

    #[must_use]
    pub fn roots(&self) -> &[PackRoot] {
        &self.roots
    }

    // ── Install ─────────────────────────────────────────────────────────

    /// Install from a local file or URL: a pack, a collection archive, or
    /// a collection JSON. Type is resolved by extension, then content
    /// sniffing.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::NotFound`] for a missing local source.
    /// - [`ManagerError::InvalidFormat`] for an unrecognized source.
    /// - [`ManagerError::AlreadyExists`] on a name collision without
    ///   `force`.
    /// - [`ManagerError::IntegrityFailure`] when a pack's stored hash
    ///   does not match its contents.
    pub async fn install(
        &self,
        source: &str,
        client: &CollectionClient,
        options: &InstallOptions,
        cancel: &CancelToken,
    ) -> Result<InstallOutcome, ManagerError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            // Fetch first, then dispatch on the downloaded bytes.
            let staging = tempfile::tempdir()?;
            let staged = staging.path().join(url_file_name(source));
            libragen_collections::download(client.http(), source, &staged, None, None, cancel)
                .await?;
            return self.install_local(&staged, client, options, cancel).await;
        }

        self.install_local(Path::new(source), client, options, cancel).await
    }

    async fn install_local(
        &self,
        path: &Path,
        client: &CollectionClient,
        options: &InstallOptions,
        cancel: &CancelToken,
    ) -> Result<InstallOutcome, ManagerError> {
        if !path.exists() {
            return Err(ManagerError::NotFound(path.display().to_string()));
        }
        let head = read_head(path)?;
        match detect_kind(path, &head) {
            Some(SourceKind::Pack) => Ok(InstallOutcome::Pack(
                self.install_pack_file(path, options).await?,
            )),
            Some(SourceKind::CollectionArchive) => Ok(InstallOutcome::Collection(
                self.install_archive(path, options).await?,
            )),
            Some(SourceKind::CollectionJson) => {
                let source = path.display().to_string();
                Ok(InstallOutcome::Collection(
                    self.install_collection(&source, client, options, None, cancel).await?,
                ))
            }
            None => Err(ManagerError::InvalidFormat(format!(
                "{}: not a pack, collection archive, or collection JSON",
                path.display()
            ))),
        }
    }

    /// Install a single local pack file into a root.
    ///
    /// # Errors
    ///
    /// See [`PackManager::install`].
    pub async fn install_pack_file(
        &self,
        path: &Path,
        options: &InstallOptions,
    ) -> Result<InstalledPack, ManagerError> {
        // Validate before touching any root: the pack must open, carry a
        // manifest, and match its own stored hash.
        let store = PackStore::open(path, true).await?;
        let manifest = store
            .manifest()
            .await?
            .ok_or_else(|| {
                ManagerError::InvalidFormat(format!("{}: pack has no manifest", path.display()))
            })?;
        if let Some(stored) = store.get_meta(meta_keys::CONTENT_HASH).await? {
            let actual = store.compute_content_hash().await?;
            if stored != actual {
                return Err(ManagerError::IntegrityFailure {
                    pack: manifest.name.clone(),
                    detail: format!("stored {stored}, recomputed {actual}"),
                });
            }
        }
        store.close();

        let root = self.target_root(options)?;
        std::fs::create_dir_all(&root.path)?;

        let existing = self.packs_in_root(&root.path, &manifest.name).await?;
        if !existing.is_empty() && !options.force {
            return Err(ManagerError::AlreadyExists {
                name: manifest.name,
                root: root.path,
            });
        }

        let dest = root
            .path
            .join(format!("{}-{}.pack", manifest.name, manifest.version));
        atomic_copy(path, &dest)?;

        // With force, drop any other files that carried this name.
        for old in existing {
            if old != dest {
                if let Err(e) = std::fs::remove_file(&old) {
                    warn!(path = %old.display(), error = %e, "failed to remove replaced pack");
                }
            }
        }

        let file_size = std::fs::metadata(&dest)?.len();
        info!(name = %manifest.name, version = %manifest.version, dest = %dest.display(), "installed pack");
        Ok(InstalledPack {
            name: manifest.name,
            version: manifest.version,
            content_version: manifest.content_version,
            path: dest,
            file_size,
            installed_at: Utc::now(),
            scope: root.scope,
        })
    }

    /// Install every pack in a collection archive, best-effort.
    async fn install_archive(
        &self,
        path: &Path,
        options: &InstallOptions,
    ) -> Result<CollectionInstallReport, ManagerError> {
        let staging = tempfile::tempdir()?;
        let (spec, packs) = extract_collection_archive(path, staging.path())?;

        let mut report = CollectionInstallReport {
            collection: spec.name,
            ..Default::default()
        };
        for pack in packs {
            match self.install_pack_file(&pack, options).await {
                Ok(installed) => report.installed.push(installed),
                Err(e) => report.failed.push(ItemFailure {
                    name: pack
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    error: e.to_string(),
                }),
            }
        }
        Ok(report)
    }

    /// Resolve a collection source and install its items, best-effort:
    /// failures are recorded per item and do not undo earlier installs.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError`] only when the collection itself cannot be
    /// resolved or the operation is canceled; item failures land in the
    /// report.
    pub async fn install_collection(
        &self,
        source: &str,
        client: &CollectionClient,
        options: &InstallOptions,
        progress: Option<&DownloadProgressFn>,
        cancel: &CancelToken,
    ) -> Result<CollectionInstallReport, ManagerError> {
        let resolved = client.resolve(source).await?;
        let mut report = CollectionInstallReport {
            collection: resolved.name.clone(),
            ..Default::default()
        };

        let staging = tempfile::tempdir()?;
        for item in resolved.items {
            if cancel.is_canceled() {
                return Err(ManagerError::Canceled);
            }
            if !item.required
                && !options.include_optional
                && !options.select_optional.contains(&item.label)
            {
                report.skipped.push(item.label);
                continue;
            }

            match self.install_item(&item, client, options, staging.path(), progress, cancel).await
            {
                Ok(installed) => report.installed.push(installed),
                Err(e) => {
                    warn!(item = %item.label, error = %e, "collection item failed to install");
                    report.failed.push(ItemFailure {
                        name: item.label,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            collection = %report.collection,
            installed = report.installed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "collection install finished"
        );
        Ok(report)
    }

    async fn install_item(
        &self,
        item: &ResolvedItem,
        client: &CollectionClient,
        options: &InstallOptions,
        staging: &Path,
        progress: Option<&DownloadProgressFn>,
        cancel: &CancelToken,
    ) -> Result<InstalledPack, ManagerError> {
        let local: PathBuf = if item.source.starts_with("http://")
            || item.source.starts_with("https://")
        {
            let staged = staging.join(url_file_name(&item.source));
            libragen_collections::download(
                client.http(),
                &item.source,
                &staged,
                None,
                progress,
                cancel,
            )
            .await?;
            staged
        } else {
            PathBuf::from(&item.source)
        };
        if !local.exists() {
            return Err(ManagerError::NotFound(item.source.clone()));
        }
        self.install_pack_file(&local, options).await
    }

    /// Resolve a collection without installing anything.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Collection`] when resolution fails.
    pub async fn preview_collection(
        &self,
        source: &str,
        client: &CollectionClient,
    ) -> Result<CollectionPreview, ManagerError> {
        let resolved = client.resolve(source).await?;
        let (required, optional): (Vec<_>, Vec<_>) =
            resolved.items.into_iter().partition(|i| i.required);
        Ok(CollectionPreview {
            name: resolved.name,
            required: required.into_iter().map(|i| i.label).collect(),
            optional: optional.into_iter().map(|i| i.label).collect(),
        })
    }

    // ── Query & removal ─────────────────────────────────────────────────

    /// All installed packs across roots, deduped by name (leftmost root
    /// wins), sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Io`] when a root cannot be read.
    /// Unreadable pack files are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<InstalledPack>, ManagerError> {
        let mut out: Vec<InstalledPack> = Vec::new();
        for root in &self.roots {
            if !root.path.exists() {
                continue;
            }
            for path in pack_files_in(&root.path)? {
                match self.read_installed(&path, root).await {
                    Ok(pack) => {
                        if !out.iter().any(|p| p.name == pack.name) {
                            out.push(pack);
                        }
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable pack");
                    }
                }
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// First pack with this name across roots.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Io`] when a root cannot be read.
    pub async fn find(&self, name: &str) -> Result<Option<InstalledPack>, ManagerError> {
        Ok(self.list().await?.into_iter().find(|p| p.name == name))
    }

    /// Remove an installed pack by name. With `root`, only that root is
    /// searched.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NotFound`] when no root holds the pack.
    pub async fn uninstall(
        &self,
        name: &str,
        root: Option<&Path>,
    ) -> Result<PathBuf, ManagerError> {
        for pack_root in &self.roots {
            if root.is_some_and(|r| r != pack_root.path) {
                continue;
            }
            if !pack_root.path.exists() {
                continue;
            }
            let matches = self.packs_in_root(&pack_root.path, name).await?;
            if let Some(path) = matches.first() {
                std::fs::remove_file(path)?;
                info!(name, path = %path.display(), "uninstalled pack");
                return Ok(path.clone());
            }
        }
        Err(ManagerError::NotFound(name.to_string()))
    }

    /// Verify an installed pack: recompute the content hash and compare
    /// to the stored value.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::NotFound`] when the pack is not installed.
    /// - [`ManagerError::IntegrityFailure`] on mismatch or when the pack
    ///   has no stored hash.
    pub async fn verify(&self, name: &str) -> Result<(), ManagerError> {
        let pack = self
            .find(name)
            .await?
            .ok_or_else(|| ManagerError::NotFound(name.to_string()))?;

        let store = PackStore::open(&pack.path, true).await?;
        let stored = store.get_meta(meta_keys::CONTENT_HASH).await?.ok_or_else(|| {
            ManagerError::IntegrityFailure {
                pack: name.to_string(),
                detail: "pack has no stored content hash".to_string(),
            }
        })?;
        let actual = store.compute_content_hash().await?;
        if stored != actual {
            return Err(ManagerError::IntegrityFailure {
                pack: name.to_string(),
                detail: format!("stored {stored}, recomputed {actual}"),
            });
        }
        debug!(name, "pack verified");
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn target_root(&self, options: &InstallOptions) -> Result<PackRoot, ManagerError> {
        if let Some(ref explicit) = options.target_root {
            let scope = self
                .roots
                .iter()
                .find(|r| &r.path == explicit)
                .map_or(InstallScope::Global, |r| r.scope);
            return Ok(PackRoot {
                path: explicit.clone(),
                scope,
            });
        }
        self.roots
            .first()
            .cloned()
            .ok_or_else(|| ManagerError::NotFound("no pack roots configured".to_string()))
    }

    /// Paths of installed pack files in `root` whose manifest name is
    /// `name`.
    async fn packs_in_root(&self, root: &Path, name: &str) -> Result<Vec<PathBuf>, ManagerError> {
        let mut matches = Vec::new();
        if !root.exists() {
            return Ok(matches);
        }
        for path in pack_files_in(root)? {
            match read_manifest_name(&path).await {
                Ok(Some(pack_name)) if pack_name == name => matches.push(path),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable pack"),
            }
        }
        Ok(matches)
    }

    async fn read_installed(
        &self,
        path: &Path,
        root: &PackRoot,
    ) -> Result<InstalledPack, ManagerError> {
        let store = PackStore::open(path, true).await?;
        let manifest = store.manifest().await?.ok_or_else(|| {
            ManagerError::InvalidFormat(format!("{}: pack has no manifest", path.display()))
        })?;
        let metadata = std::fs::metadata(path)?;
        let installed_at = metadata
            .modified()
            .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);
        Ok(InstalledPack {
            name: manifest.name,
            version: manifest.version,
            content_version: manifest.content_version,
            path: path.to_path_buf(),
            file_size: metadata.len(),
            installed_at,
            scope: root.scope,
        })
    }
}

/// Pack files directly under `root`, sorted by file name.
fn pack_files_in(root: &Path) -> Result<Vec<PathBuf>, ManagerError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "pack" || e == "libragen")
        })
        .collect();
    files.sort();
    Ok(files)
}

async fn read_manifest_name(path: &Path) -> Result<Option<String>, ManagerError> {
    let store = PackStore::open(path, true).await?;
    Ok(store.manifest().await?.map(|m| m.name))
}

/// First bytes of a file, for format sniffing.
fn read_head(path: &Path) -> Result<Vec<u8>, ManagerError> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut head = [0u8; 64];
    let n = file.read(&mut head)?;
    Ok(head[..n].to_vec())
}

/// Copy `src` to `dest` atomically: temp file in the destination dir,
/// fsync, rename.
fn atomic_copy(src: &Path, dest: &Path) -> Result<(), ManagerError> {
    let dir = dest.parent().ok_or_else(|| {
        ManagerError::InvalidFormat(format!("{}: destination has no parent", dest.display()))
    })?;
    let temp = tempfile::NamedTempFile::new_in(dir)?;
    std::fs::copy(src, temp.path())?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| ManagerError::Io(e.error))?;
    Ok(())
}

/// Last path segment of a URL, defaulting to a generic name.
fn url_file_name(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or("download.pack")
        .to_string()
}
