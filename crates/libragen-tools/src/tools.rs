//! Tool operation implementations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use libragen_collections::CollectionClient;
use libragen_core::cancel::CancelToken;
use libragen_core::collection::InstallScope;
use libragen_embed::{Reranker, TextEncoder};
use libragen_manager::{PackManager, UpdateCandidate, find_updates, perform_update};
use libragen_search::{SearchHit, SearchRequest, search};
use libragen_store::{CURRENT_SCHEMA_VERSION, PackStore};

use crate::error::ToolError;

/// One installed pack with its manifest highlights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackSummary {
    pub name: String,
    pub version: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub agent_description: Option<String>,
    pub content_version: Option<String>,
    pub chunk_count: u64,
    pub file_size: u64,
    pub scope: InstallScope,
    pub path: PathBuf,
}

/// `list` — enumerate installed packs with manifest fields.
///
/// # Errors
///
/// Returns [`ToolError::Manager`] when a pack root cannot be read.
/// Individual unreadable packs are skipped with a warning.
pub async fn list_packs(manager: &PackManager) -> Result<Vec<PackSummary>, ToolError> {
    let mut out = Vec::new();
    for installed in manager.list().await? {
        let store = match PackStore::open(&installed.path, true).await {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %installed.path.display(), error = %e, "skipping unreadable pack");
                continue;
            }
        };
        let manifest = store.manifest().await?.unwrap_or_default();
        out.push(PackSummary {
            name: installed.name,
            version: installed.version,
            display_name: manifest.display_name,
            description: manifest.description,
            agent_description: manifest.agent_description,
            content_version: installed.content_version,
            chunk_count: manifest.stats.chunk_count,
            file_size: installed.file_size,
            scope: installed.scope,
            path: installed.path,
        });
    }
    Ok(out)
}

/// Parameters for the `search` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    /// Restrict to these pack names; `None` searches every installed
    /// pack.
    #[serde(default)]
    pub libraries: Option<Vec<String>>,
    #[serde(default)]
    pub content_version: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_alpha")]
    pub hybrid_alpha: f64,
    #[serde(default = "default_context")]
    pub context_before: usize,
    #[serde(default = "default_context")]
    pub context_after: usize,
    #[serde(default)]
    pub rerank: bool,
}

const fn default_top_k() -> usize {
    10
}

const fn default_alpha() -> f64 {
    0.5
}

const fn default_context() -> usize {
    1
}

impl SearchParams {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            libraries: None,
            content_version: None,
            top_k: default_top_k(),
            hybrid_alpha: default_alpha(),
            context_before: default_context(),
            context_after: default_context(),
            rerank: false,
        }
    }
}

/// One hit from the aggregated multi-pack search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackSearchHit {
    /// Name of the pack this hit came from.
    pub library: String,
    #[serde(flatten)]
    pub hit: SearchHit,
}

/// `search` — run one query against every selected installed pack and
/// merge the results, sorted by score and trimmed to `top_k`.
///
/// Packs on an older schema version are skipped with a warning (they need
/// a writable migration first).
///
/// # Errors
///
/// Returns [`ToolError`] on embedding failure or store errors in a pack
/// being searched.
pub async fn search_packs<E, R>(
    manager: &PackManager,
    encoder: &E,
    reranker: Option<&R>,
    params: &SearchParams,
    cancel: &CancelToken,
) -> Result<Vec<PackSearchHit>, ToolError>
where
    E: TextEncoder,
    R: Reranker,
{
    let mut out: Vec<PackSearchHit> = Vec::new();

    for installed in manager.list().await? {
        if params
            .libraries
            .as_ref()
            .is_some_and(|names| !names.contains(&installed.name))
        {
            continue;
        }

        let store = PackStore::open(&installed.path, true).await?;
        let schema = store.schema_version().await?;
        if schema != CURRENT_SCHEMA_VERSION {
            warn!(
                pack = %installed.name,
                schema,
                "skipping pack on old schema; reinstall or update to migrate"
            );
            continue;
        }

        let request = SearchRequest {
            query: params.query.clone(),
            k: params.top_k,
            hybrid_alpha: params.hybrid_alpha,
            content_version: params.content_version.clone(),
            source_glob: None,
            context_before: params.context_before,
            context_after: params.context_after,
            rerank: params.rerank,
        };
        let hits = search(&store, encoder, reranker, &request, cancel).await?;
        debug!(pack = %installed.name, hits = hits.len(), "searched pack");
        out.extend(hits.into_iter().map(|hit| PackSearchHit {
            library: installed.name.clone(),
            hit,
        }));
    }

    out.sort_by(|a, b| {
        b.hit
            .score
            .total_cmp(&a.hit.score)
            .then_with(|| a.library.cmp(&b.library))
            .then_with(|| a.hit.chunk_id.cmp(&b.hit.chunk_id))
    });
    out.truncate(params.top_k);
    Ok(out)
}

/// `uninstall` — remove an installed pack by name.
///
/// # Errors
///
/// Returns [`ToolError::Manager`] with `NotFound` when no root holds the
/// pack.
pub async fn uninstall_pack(manager: &PackManager, name: &str) -> Result<PathBuf, ToolError> {
    Ok(manager.uninstall(name, None).await?)
}

/// Parameters for the `update` tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateParams {
    /// Restrict to one pack; `None` considers all installed packs.
    #[serde(default)]
    pub name: Option<String>,
    /// Consider same-version entries as candidates too.
    #[serde(default)]
    pub force: bool,
    /// Plan only; apply nothing.
    #[serde(default)]
    pub dry_run: bool,
}

/// Result of the `update` tool.
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Everything that was found updatable.
    pub candidates: Vec<UpdateCandidate>,
    /// Names updated (empty on dry runs).
    pub updated: Vec<String>,
    /// Per-pack failures (name, error).
    pub failed: Vec<(String, String)>,
}

/// `update` — plan updates against collection indexes and, unless
/// `dry_run`, apply them best-effort.
///
/// # Errors
///
/// Returns [`ToolError`] when listing installed packs or fetching indexes
/// fails; per-pack update failures land in the report.
pub async fn update_packs(
    manager: &PackManager,
    client: &CollectionClient,
    params: &UpdateParams,
    cancel: &CancelToken,
) -> Result<UpdateReport, ToolError> {
    let mut installed = manager.list().await?;
    if let Some(ref name) = params.name {
        installed.retain(|p| &p.name == name);
        if installed.is_empty() {
            return Err(libragen_manager::ManagerError::NotFound(name.clone()).into());
        }
    }

    let candidates = find_updates(&installed, client, params.force).await?;
    let mut report = UpdateReport {
        candidates: candidates.clone(),
        ..Default::default()
    };
    if params.dry_run {
        return Ok(report);
    }

    for candidate in &candidates {
        match perform_update(candidate, manager, client, cancel).await {
            Ok(pack) => report.updated.push(pack.name),
            Err(e) => {
                warn!(name = %candidate.name, error = %e, "update failed");
                report.failed.push((candidate.name.clone(), e.to_string()));
            }
        }
    }
    Ok(report)
}
