//! Version comparison for packs and content versions.
//!
//! Pack versions are nominally semver, but content versions may be dates
//! (`"2026-05-01"`) or opaque strings. Comparison tries strict semver
//! first, then a lenient numeric-prefix parse (`"1.74"` → `1.74.0`), and
//! finally falls back to plain string ordering so every pair of versions
//! is totally ordered.

use std::cmp::Ordering;

/// Compare two version strings, newest last.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_lenient(a), parse_lenient(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}

/// Returns true when `candidate` is strictly newer than `current`.
#[must_use]
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

/// Parse a version leniently: strict semver, else pad a `major[.minor]`
/// numeric prefix to three components.
fn parse_lenient(s: &str) -> Option<semver::Version> {
    let trimmed = s.trim().trim_start_matches(['v', 'V']);
    if let Ok(v) = semver::Version::parse(trimmed) {
        return Some(v);
    }

    let mut parts = trimmed.splitn(3, '.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u64 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let patch: u64 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    Some(semver::Version::new(major, minor, patch))
}
