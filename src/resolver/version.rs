//! Version comparison for merging contributing manifests.

use std::cmp::Ordering;

use semver::Version;

/// Parse a version string, allowing for incomplete versions.
pub fn parse_version_lenient(s: &str) -> Option<Version> {
    // Try exact parse first
    if let Ok(v) = s.parse() {
        return Some(v);
    }

    // Try adding missing components
    let parts: Vec<&str> = s.split('.').collect();
    match parts.len() {
        1 => {
            let major: u64 = parts[0].parse().ok()?;
            Some(Version::new(major, 0, 0))
        }
        2 => {
            let major: u64 = parts[0].parse().ok()?;
            let minor: u64 = parts[1].parse().ok()?;
            Some(Version::new(major, minor, 0))
        }
        _ => None,
    }
}

/// Compare two version strings.
///
/// Semantic comparison when both sides parse, ordinal string comparison
/// otherwise.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version_lenient(a), parse_version_lenient(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}

/// Whether `candidate` is strictly higher than `current`.
pub fn is_higher(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}
