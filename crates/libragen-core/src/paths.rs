//! Resolved filesystem layout.
//!
//! Environment variables are read exactly once, here, and the resulting
//! [`Paths`] value is passed to every component that touches the disk.
//!
//! - `LIBRAGEN_HOME` — root directory (default: platform app-data dir
//!   plus `libragen`).
//! - `LIBRAGEN_MODEL_CACHE` — overrides the model download directory.

use std::path::{Path, PathBuf};

/// Env var naming the Libragen home directory.
pub const HOME_ENV: &str = "LIBRAGEN_HOME";

/// Env var overriding the model cache directory.
pub const MODEL_CACHE_ENV: &str = "LIBRAGEN_MODEL_CACHE";

/// Directory name holding project-scoped installs, relative to a project
/// root: `.libragen/libraries`.
pub const PROJECT_LIBRARIES_DIR: &str = ".libragen/libraries";

/// Resolved filesystem layout for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    home: PathBuf,
    models: PathBuf,
}

impl Paths {
    /// Resolve from the environment.
    #[must_use]
    pub fn resolve() -> Self {
        let home = std::env::var_os(HOME_ENV).map_or_else(default_home, PathBuf::from);
        let models = std::env::var_os(MODEL_CACHE_ENV)
            .map_or_else(|| home.join("models"), PathBuf::from);
        Self { home, models }
    }

    /// Build from an explicit home directory (tests, embedding hosts).
    #[must_use]
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let models = home.join("models");
        Self { home, models }
    }

    /// Root directory holding all Libragen state.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Globally installed pack files.
    #[must_use]
    pub fn libraries_dir(&self) -> PathBuf {
        self.home.join("libraries")
    }

    /// Downloaded embedding/reranker models.
    #[must_use]
    pub fn models_dir(&self) -> &Path {
        &self.models
    }

    /// The collections config file.
    #[must_use]
    pub fn collections_config(&self) -> PathBuf {
        self.home.join("collections.json")
    }

    /// On-disk cache for fetched collection indexes.
    #[must_use]
    pub fn collections_cache_dir(&self) -> PathBuf {
        self.home.join("cache").join("collections")
    }

    /// Project-scoped libraries dir under `dir`, if it exists.
    #[must_use]
    pub fn project_libraries_dir(dir: &Path) -> Option<PathBuf> {
        let candidate = dir.join(PROJECT_LIBRARIES_DIR);
        candidate.is_dir().then_some(candidate)
    }
}

fn default_home() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("libragen")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn derived_dirs_hang_off_home() {
        let paths = Paths::from_home("/tmp/lg-home");
        assert_eq!(paths.libraries_dir(), PathBuf::from("/tmp/lg-home/libraries"));
        assert_eq!(paths.models_dir(), Path::new("/tmp/lg-home/models"));
        assert_eq!(
            paths.collections_cache_dir(),
            PathBuf::from("/tmp/lg-home/cache/collections")
        );
        assert_eq!(
            paths.collections_config(),
            PathBuf::from("/tmp/lg-home/collections.json")
        );
    }

    #[test]
    fn project_dir_requires_existing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(Paths::project_libraries_dir(tmp.path()), None);

        let libs = tmp.path().join(PROJECT_LIBRARIES_DIR);
        std::fs::create_dir_all(&libs).unwrap();
        assert_eq!(Paths::project_libraries_dir(tmp.path()), Some(libs));
    }
}
