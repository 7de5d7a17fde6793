//! Walks ingest roots and yields text files for chunking.
//!
//! Directories are walked in sorted order (builds must be deterministic),
//! filtered by include globs, ignore globs, and a size cap. Roots that
//! name a file directly are included without pattern matching; roots that
//! do not exist are skipped with a warning.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::language::language_for_path;

/// Default include patterns: common code and documentation extensions.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "*.rs", "*.py", "*.js", "*.ts", "*.tsx", "*.jsx", "*.go", "*.java", "*.kt", "*.c", "*.h",
    "*.cc", "*.cpp", "*.hpp", "*.cs", "*.rb", "*.php", "*.swift", "*.scala", "*.sh", "*.sql",
    "*.lua", "*.ex", "*.exs", "*.hs", "*.ml", "*.zig", "*.md", "*.mdx", "*.rst", "*.txt",
    "*.html", "*.css", "*.json", "*.yaml", "*.yml", "*.toml",
];

/// Default ignore entries: dependency and VCS directories.
pub const DEFAULT_IGNORE: &[&str] = &[
    "node_modules",
    ".git",
    ".hg",
    ".svn",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "vendor",
];

/// Default per-file size cap: 1 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Configuration for a source walk.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Include globs, matched against paths relative to each root.
    pub patterns: Vec<String>,
    /// Ignore globs; bare names also match as directory components.
    pub ignore: Vec<String>,
    /// Files larger than this are dropped.
    pub max_file_size: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.iter().map(ToString::to_string).collect(),
            ignore: DEFAULT_IGNORE.iter().map(ToString::to_string).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// One text file ready for chunking.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the ingest root, `/`-separated.
    pub relative_path: String,
    pub content: String,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
}

/// Walk `roots` and collect matching text files, in deterministic order.
///
/// # Errors
///
/// Returns [`IngestError::Pattern`] if a glob fails to compile. Unreadable
/// and non-UTF-8 files are skipped with a warning, not an error.
pub fn read_sources(roots: &[PathBuf], config: &ReaderConfig) -> Result<Vec<SourceFile>, IngestError> {
    let include = build_globset(&config.patterns, false)?;
    let ignore = build_globset(&config.ignore, true)?;

    let mut out = Vec::new();
    for root in roots {
        if !root.exists() {
            warn!(root = %root.display(), "ingest root does not exist, skipping");
            continue;
        }

        if root.is_file() {
            // Explicit files bypass include patterns but honor the size cap.
            let rel = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(file) = load_file(root, rel, config.max_file_size) {
                out.push(file);
            }
            continue;
        }

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "walk error, skipping entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if ignore.is_match(&rel_str) || !include.is_match(&rel_str) {
                continue;
            }
            if let Some(file) = load_file(path, rel_str, config.max_file_size) {
                out.push(file);
            }
        }
    }

    debug!(count = out.len(), "collected source files");
    Ok(out)
}

fn load_file(path: &Path, relative_path: String, max_file_size: u64) -> Option<SourceFile> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot stat file, skipping");
            return None;
        }
    };
    let size = metadata.len();
    if size > max_file_size {
        debug!(path = %path.display(), size, max_file_size, "file over size cap, dropping");
        return None;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read as UTF-8 text, skipping");
            return None;
        }
    };

    let modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);

    Some(SourceFile {
        language: language_for_path(path).map(ToString::to_string),
        path: path.to_path_buf(),
        relative_path,
        content,
        size,
        modified_at,
    })
}

/// Compile globs. When `expand_names` is set, bare entries (no `/` or
/// glob metacharacters) also match as a path component anywhere in the
/// tree, so `node_modules` prunes `a/node_modules/b.js`.
fn build_globset(patterns: &[String], expand_names: bool) -> Result<GlobSet, IngestError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let mut add = |p: &str| -> Result<(), IngestError> {
            builder.add(Glob::new(p).map_err(|e| IngestError::Pattern {
                pattern: p.to_string(),
                message: e.to_string(),
            })?);
            Ok(())
        };
        add(pattern)?;
        if expand_names && !pattern.contains(['/', '*', '?', '[']) {
            add(&format!("{pattern}/**"))?;
            add(&format!("**/{pattern}/**"))?;
        }
    }
    builder.build().map_err(|e| IngestError::Pattern {
        pattern: String::new(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn rel_paths(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn walks_matching_files_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/zeta.rs", "fn z() {}");
        write(&dir, "src/alpha.rs", "fn a() {}");
        write(&dir, "README.md", "# readme");
        write(&dir, "image.png", "not text");

        let files = read_sources(&[dir.path().to_path_buf()], &ReaderConfig::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["README.md", "src/alpha.rs", "src/zeta.rs"]);
    }

    #[test]
    fn default_ignores_prune_dependency_dirs() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/main.js", "console.log(1)");
        write(&dir, "node_modules/pkg/index.js", "module.exports = {}");
        write(&dir, "deep/node_modules/other.js", "x");

        let files = read_sources(&[dir.path().to_path_buf()], &ReaderConfig::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["src/main.js"]);
    }

    #[test]
    fn oversized_files_are_silently_dropped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "big.md", &"x".repeat(2048));
        write(&dir, "small.md", "tiny");

        let config = ReaderConfig {
            max_file_size: 1024,
            ..Default::default()
        };
        let files = read_sources(&[dir.path().to_path_buf()], &config).unwrap();
        assert_eq!(rel_paths(&files), vec!["small.md"]);
    }

    #[test]
    fn nonexistent_roots_are_skipped_without_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.rs", "fn main() {}");

        let roots = vec![
            PathBuf::from("/definitely/not/a/path"),
            dir.path().to_path_buf(),
        ];
        let files = read_sources(&roots, &ReaderConfig::default()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn explicit_file_roots_bypass_patterns() {
        let dir = TempDir::new().unwrap();
        write(&dir, "notes.unknown_ext", "some text");

        let files = read_sources(
            &[dir.path().join("notes.unknown_ext")],
            &ReaderConfig::default(),
        )
        .unwrap();
        assert_eq!(rel_paths(&files), vec!["notes.unknown_ext"]);
        assert_eq!(files[0].language, None);
    }

    #[test]
    fn language_and_metadata_are_populated() {
        let dir = TempDir::new().unwrap();
        write(&dir, "lib.rs", "pub fn x() {}");

        let files = read_sources(&[dir.path().to_path_buf()], &ReaderConfig::default()).unwrap();
        let file = &files[0];
        assert_eq!(file.language.as_deref(), Some("rust"));
        assert_eq!(file.size, "pub fn x() {}".len() as u64);
        assert!(file.modified_at.is_some());
    }
}
