//! The local collections config file.
//!
//! A JSON document at `<home>/collections.json` listing the collection
//! indexes this installation knows about, ordered by priority (lower
//! number wins).

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One configured collection source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub name: String,
    /// URL of the served collection index JSON.
    pub url: String,
    /// Lower numbers are consulted first.
    #[serde(default)]
    pub priority: i32,
}

/// The config file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default)]
    pub collections: Vec<CollectionRef>,
}

impl CollectionsConfig {
    /// Load from `path`. A missing file is an empty config.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, crate::CollectionError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or write failure.
    pub fn save(&self, path: &Path) -> Result<(), crate::CollectionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Collections sorted ascending by priority, then name.
    #[must_use]
    pub fn sorted(&self) -> Vec<CollectionRef> {
        let mut sorted = self.collections.clone();
        sorted.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn reference(name: &str, priority: i32) -> CollectionRef {
        CollectionRef {
            name: name.to_string(),
            url: format!("https://packs.example.com/{name}/index.json"),
            priority,
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = CollectionsConfig::load(&dir.path().join("collections.json")).unwrap();
        assert!(config.collections.is_empty());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/collections.json");

        let config = CollectionsConfig {
            collections: vec![reference("main", 0), reference("extra", 10)],
        };
        config.save(&path).unwrap();
        assert_eq!(CollectionsConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn sorted_orders_by_priority_then_name() {
        let config = CollectionsConfig {
            collections: vec![reference("zeta", 5), reference("beta", 0), reference("alpha", 5)],
        };
        let sorted = config.sorted();
        let names: Vec<&str> = sorted.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["beta", "alpha", "zeta"]);
    }
}
