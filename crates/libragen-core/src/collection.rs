//! Collection documents and installed-pack records.
//!
//! A *collection* is a named set of packs (optionally nesting other
//! collections) defined by a JSON document. A *collection index* is the
//! URL-served JSON enumerating downloadable pack versions. Wire formats use
//! camelCase where the served JSON does (`downloadURL`, `contentHash`).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A collection definition document (`collection.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub items: Vec<CollectionItem>,
}

/// One entry in a collection: either a library (pack) or a nested
/// collection, each referenced by URL or local path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionItem {
    Library {
        library: String,
        #[serde(default = "default_required")]
        required: bool,
    },
    Collection {
        collection: String,
    },
}

const fn default_required() -> bool {
    true
}

/// The served collection index document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionIndex {
    pub name: String,
    pub version: String,

    #[serde(default, rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub libraries: Vec<IndexLibrary>,
}

/// One library listed in a collection index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexLibrary {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub versions: Vec<IndexVersion>,
}

/// One downloadable version of an indexed library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexVersion {
    pub version: String,

    #[serde(default, rename = "contentVersion")]
    pub content_version: Option<String>,

    #[serde(default, rename = "contentVersionType")]
    pub content_version_type: Option<String>,

    #[serde(rename = "downloadURL")]
    pub download_url: String,

    /// `sha256:<hex>` of the pack file. Absent entries skip verification.
    #[serde(default, rename = "contentHash")]
    pub content_hash: Option<String>,

    #[serde(default, rename = "fileSize")]
    pub file_size: Option<u64>,
}

/// A concrete downloadable entry resolved from an index: library name plus
/// the selected version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub description: String,
    pub collection: String,
    pub version: IndexVersion,
}

/// Where an installed pack file lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallScope {
    /// Under `<cwd>/.libragen/libraries`.
    Project,
    /// Under the global libraries dir.
    Global,
}

/// Derived view of one installed pack file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPack {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub content_version: Option<String>,

    pub path: PathBuf,
    pub file_size: u64,

    /// File modification time, used as the install timestamp.
    pub installed_at: DateTime<Utc>,

    pub scope: InstallScope,
}
