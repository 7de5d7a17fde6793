//! The collection client.
//!
//! Wraps the config file, a TTL-cached index fetch, library lookup, and
//! resolution of collection definition documents (with nesting) into a
//! flat list of installable items.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use libragen_core::cancel::CancelToken;
use libragen_core::collection::{CollectionIndex, CollectionItem, CollectionSpec, IndexEntry};
use libragen_core::paths::Paths;
use libragen_core::progress::DownloadProgressFn;
use libragen_core::version::compare_versions;

use crate::config::{CollectionRef, CollectionsConfig};
use crate::download;
use crate::error::CollectionError;

/// Nested collections deeper than this are rejected as malformed.
const MAX_COLLECTION_DEPTH: usize = 8;

/// Client construction options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request network timeout.
    pub timeout: Duration,
    /// How long cached collection documents stay fresh.
    pub cache_ttl: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// A collection definition resolved to concrete installable items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCollection {
    pub name: String,
    pub version: String,
    pub items: Vec<ResolvedItem>,
}

/// One installable item from a resolved collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    /// Short human label derived from the source (file stem).
    pub label: String,
    /// Download URL or local path of a pack file.
    pub source: String,
    pub required: bool,
}

/// Client over the local collections config and remote indexes.
pub struct CollectionClient {
    config_path: PathBuf,
    cache_dir: PathBuf,
    http: reqwest::Client,
    cache_ttl: Duration,
}

impl CollectionClient {
    /// Build a client rooted at the resolved Libragen paths.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(paths: &Paths, options: ClientOptions) -> Result<Self, CollectionError> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;
        Ok(Self {
            config_path: paths.collections_config(),
            cache_dir: paths.collections_cache_dir(),
            http,
            cache_ttl: options.cache_ttl,
        })
    }

    /// The HTTP client, shared with installers that fetch pack URLs.
    #[must_use]
    pub const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Config ──────────────────────────────────────────────────────────

    /// Add or update a configured collection.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError`] on config read/write failure.
    pub fn add_collection(&self, name: &str, url: &str, priority: i32) -> Result<(), CollectionError> {
        let mut config = CollectionsConfig::load(&self.config_path)?;
        if let Some(existing) = config.collections.iter_mut().find(|c| c.name == name) {
            existing.url = url.to_string();
            existing.priority = priority;
        } else {
            config.collections.push(CollectionRef {
                name: name.to_string(),
                url: url.to_string(),
                priority,
            });
        }
        config.save(&self.config_path)
    }

    /// Remove a configured collection.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NotFound`] if no collection has that
    /// name.
    pub fn remove_collection(&self, name: &str) -> Result<(), CollectionError> {
        let mut config = CollectionsConfig::load(&self.config_path)?;
        let before = config.collections.len();
        config.collections.retain(|c| c.name != name);
        if config.collections.len() == before {
            return Err(CollectionError::NotFound(name.to_string()));
        }
        config.save(&self.config_path)
    }

    /// Configured collections, ascending by priority.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError`] on config read failure.
    pub fn list(&self) -> Result<Vec<CollectionRef>, CollectionError> {
        Ok(CollectionsConfig::load(&self.config_path)?.sorted())
    }

    // ── Index access ────────────────────────────────────────────────────

    /// Fetch and parse a served collection index, using the on-disk cache
    /// when fresh.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::Transport`] on network failure,
    /// [`CollectionError::Json`] on a malformed document.
    pub async fn fetch_index(&self, url: &str) -> Result<CollectionIndex, CollectionError> {
        let raw = self.fetch_cached(url).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Search configured collections for libraries whose name or
    /// description contains `query` (case-insensitive). Returns the
    /// latest matching version per library, in collection priority order.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError`] on config or index failure.
    pub async fn search(
        &self,
        query: &str,
        content_version: Option<&str>,
    ) -> Result<Vec<IndexEntry>, CollectionError> {
        let needle = query.to_lowercase();
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for reference in self.list()? {
            let index = self.fetch_index(&reference.url).await?;
            for library in &index.libraries {
                let haystack =
                    format!("{} {}", library.name.to_lowercase(), library.description.to_lowercase());
                if !haystack.contains(&needle) || seen.contains(&library.name) {
                    continue;
                }
                if let Some(version) = latest_version(library, None, content_version) {
                    seen.insert(library.name.clone());
                    out.push(IndexEntry {
                        name: library.name.clone(),
                        description: library.description.clone(),
                        collection: reference.name.clone(),
                        version: version.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Look up a library by exact name, optionally pinned to a version.
    /// `None` when no configured collection lists it.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError`] on config or index failure.
    pub async fn get_entry(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<IndexEntry>, CollectionError> {
        for reference in self.list()? {
            let index = self.fetch_index(&reference.url).await?;
            for library in &index.libraries {
                if library.name != name {
                    continue;
                }
                if let Some(found) = latest_version(library, version, None) {
                    return Ok(Some(IndexEntry {
                        name: library.name.clone(),
                        description: library.description.clone(),
                        collection: reference.name.clone(),
                        version: found.clone(),
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Download an index entry to `dest`, verifying its declared hash
    /// unless `verify_hash` is off (for entries without one).
    ///
    /// # Errors
    ///
    /// See [`crate::download::download`].
    pub async fn download_entry(
        &self,
        entry: &IndexEntry,
        dest: &Path,
        verify_hash: bool,
        progress: Option<&DownloadProgressFn>,
        cancel: &CancelToken,
    ) -> Result<(), CollectionError> {
        let expected = if verify_hash {
            entry.version.content_hash.as_deref()
        } else {
            None
        };
        download::download(
            &self.http,
            &entry.version.download_url,
            dest,
            expected,
            progress,
            cancel,
        )
        .await
    }

    // ── Collection definition resolution ────────────────────────────────

    /// Resolve a collection source — a configured name, a URL, or a local
    /// path of a `collection.json` — into a flat list of installable
    /// items. Nested collections are flattened; cycles are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NotFound`] for unknown names/paths,
    /// [`CollectionError::InvalidFormat`] for malformed or over-deep
    /// nesting.
    pub async fn resolve(&self, source: &str) -> Result<ResolvedCollection, CollectionError> {
        // A configured name resolves to its URL first.
        let root_source = match self.list()?.into_iter().find(|c| c.name == source) {
            Some(reference) => reference.url,
            None => source.to_string(),
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: Vec<(String, Option<PathBuf>, usize)> = vec![(root_source, None, 0)];
        let mut items = Vec::new();
        let mut root: Option<(String, String)> = None;

        while let Some((doc_source, base, depth)) = queue.pop() {
            if depth > MAX_COLLECTION_DEPTH {
                return Err(CollectionError::InvalidFormat(format!(
                    "collections nested deeper than {MAX_COLLECTION_DEPTH}"
                )));
            }
            if !visited.insert(doc_source.clone()) {
                debug!(source = %doc_source, "skipping already-visited collection");
                continue;
            }

            let (spec, doc_base) = self.load_spec(&doc_source, base.as_deref()).await?;
            if root.is_none() {
                root = Some((spec.name.clone(), spec.version.clone()));
            }

            for item in spec.items {
                match item {
                    CollectionItem::Library { library, required } => {
                        let source = resolve_relative(&library, doc_base.as_deref());
                        items.push(ResolvedItem {
                            label: label_for(&source),
                            source,
                            required,
                        });
                    }
                    CollectionItem::Collection { collection } => {
                        let nested = resolve_relative(&collection, doc_base.as_deref());
                        queue.push((nested, doc_base.clone(), depth + 1));
                    }
                }
            }
        }

        let (name, version) = root.ok_or_else(|| {
            CollectionError::InvalidFormat("empty collection source".to_string())
        })?;
        Ok(ResolvedCollection { name, version, items })
    }

    /// Load one collection definition document.
    async fn load_spec(
        &self,
        source: &str,
        base: Option<&Path>,
    ) -> Result<(CollectionSpec, Option<PathBuf>), CollectionError> {
        if is_url(source) {
            let raw = self.fetch_cached(source).await?;
            let spec: CollectionSpec = serde_json::from_str(&raw)?;
            return Ok((spec, None));
        }

        let path = base.map_or_else(|| PathBuf::from(source), |b| b.join(source));
        if !path.exists() {
            return Err(CollectionError::NotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(&path)?;
        let spec: CollectionSpec = serde_json::from_str(&raw)?;
        let parent = path.parent().map(Path::to_path_buf);
        Ok((spec, parent))
    }

    /// Fetch a URL's body, serving from the on-disk cache when fresh.
    async fn fetch_cached(&self, url: &str) -> Result<String, CollectionError> {
        let cache_path = self.cache_path(url);
        if let Some(raw) = read_fresh(&cache_path, self.cache_ttl) {
            debug!(url, "serving collection document from cache");
            return Ok(raw);
        }

        let response = self.http.get(url).send().await?.error_for_status()?;
        let raw = response.text().await?;

        std::fs::create_dir_all(&self.cache_dir)?;
        if let Err(e) = std::fs::write(&cache_path, &raw) {
            warn!(url, error = %e, "failed to write collection cache");
        }
        Ok(raw)
    }

    fn cache_path(&self, url: &str) -> PathBuf {
        let key = format!("{:x}", Sha256::digest(url.as_bytes()));
        self.cache_dir.join(format!("{key}.json"))
    }
}

/// Best version of a library: pinned when `version` is given, otherwise
/// the latest, restricted to `content_version` when given.
fn latest_version<'a>(
    library: &'a libragen_core::collection::IndexLibrary,
    version: Option<&str>,
    content_version: Option<&str>,
) -> Option<&'a libragen_core::collection::IndexVersion> {
    let mut candidates: Vec<_> = library
        .versions
        .iter()
        .filter(|v| content_version.is_none_or(|cv| v.content_version.as_deref() == Some(cv)))
        .collect();
    if let Some(pinned) = version {
        return candidates.into_iter().find(|v| v.version == pinned);
    }
    candidates.sort_by(|a, b| compare_versions(&a.version, &b.version));
    candidates.pop()
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Join a possibly relative local source against its document's directory.
/// URLs pass through untouched.
fn resolve_relative(source: &str, base: Option<&Path>) -> String {
    if is_url(source) {
        return source.to_string();
    }
    let path = Path::new(source);
    if path.is_absolute() {
        return source.to_string();
    }
    base.map_or_else(
        || source.to_string(),
        |b| b.join(path).to_string_lossy().into_owned(),
    )
}

/// Short label for an item: the file stem of its URL path or local path.
fn label_for(source: &str) -> String {
    let tail = source.rsplit('/').next().unwrap_or(source);
    tail.trim_end_matches(".pack")
        .trim_end_matches(".libragen")
        .to_string()
}

fn read_fresh(path: &Path, ttl: Duration) -> Option<String> {
    let metadata = std::fs::metadata(path).ok()?;
    let age = metadata.modified().ok()?.elapsed().ok()?;
    if age > ttl {
        return None;
    }
    std::fs::read_to_string(path).ok()
}
