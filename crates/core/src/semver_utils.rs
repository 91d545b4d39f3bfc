//! Semantic version utilities for OCI registry operations
//!
//! This module provides utilities for parsing, filtering, sorting, and comparing
//! semantic version tags commonly found in OCI registries.
//!
//! ## Features
//!
//! - Parse versions from various formats ("v1.2.3", "1.2.3", "1.2", "1")
//! - Filter tags to only semantic versions
//! - Sort tags in semantic version order
//! - Compute semantic tags (e.g., "1.2.3" â†’ ["1", "1.2", "1.2.3", "latest"])
//! - Compare versions
//!
//! ## Examples
//!
//! ```rust
//! use crucible_core::semver_utils;
//!
//! // Parse a version
//! let version = semver_utils::parse_version("v1.2.3");
//! assert!(version.is_some());
//!
//! // Filter and sort tags
//! let tags = vec!["1.0.0".to_string(), "latest".to_string(), "2.0.0".to_string()];
//! let semver_tags = semver_utils::filter_semver_tags(&tags);
//! let mut sorted_tags = semver_tags.clone();
//! semver_utils::sort_tags_descending(&mut sorted_tags);
//!
//! // Compute semantic tags for publishing
//! let tags = semver_utils::compute_semantic_tags("1.2.3");
//! assert_eq!(tags, vec!["1", "1.2", "1.2.3", "latest"]);
//! ```

use semver::Version;
use std::cmp::Ordering;

/// Parse a semantic version from a tag string
///
/// Handles tags like "v1.2.3", "1.2.3", "1.2", "1"
///
/// # Examples
///
/// ```rust
/// use crucible_core::semver_utils::parse_version;
///
/// assert!(parse_version("1.2.3").is_some());
/// assert!(parse_version("v1.2.3").is_some());
/// assert!(parse_version("1.2").is_some());
/// assert!(parse_version("1").is_some());
/// assert!(parse_version("invalid").is_none());
/// ```
pub fn parse_version(tag: &str) -> Option<Version> {
    // Strip leading 'v' if present
    let version_str = tag.strip_prefix('v').unwrap_or(tag);

    // Try direct parse first
    if let Ok(version) = Version::parse(version_str) {
        return Some(version);
    }

    // Try with .0 suffix for major.minor versions
    if let Ok(version) = Version::parse(&format!("{}.0", version_str)) {
        return Some(version);
    }

    // Try with .0.0 suffix for major versions
    if let Ok(version) = Version::parse(&format!("{}.0.0", version_str)) {
        return Some(version);
    }

    None
}

/// Filter tags to only semantic versions
///
/// # Examples
///
/// ```rust
/// use crucible_core::semver_utils::filter_semver_tags;
///
/// let tags = vec![
///     "1.2.3".to_string(),
///     "latest".to_string(),
///     "v2.0.0".to_string(),
///     "dev".to_string(),
/// ];
/// let filtered = filter_semver_tags(&tags);
/// assert_eq!(filtered.len(), 2);
/// ```
pub fn filter_semver_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter(|tag| parse_version(tag).is_some())
        .cloned()
        .collect()
}

/// Sort tags in descending semantic version order
///
/// Valid semantic versions are sorted first in descending order,
/// followed by non-semantic version tags in reverse lexical order.
///
/// # Examples
///
/// ```rust
/// use crucible_core::semver_utils::sort_tags_descending;
///
/// let mut tags = vec![
///     "1.0.0".to_string(),
///     "2.1.0".to_string(),
///     "1.5.0".to_string(),
/// ];
/// sort_tags_descending(&mut tags);
/// assert_eq!(tags[0], "2.1.0");
/// assert_eq!(tags[1], "1.5.0");
/// assert_eq!(tags[2], "1.0.0");
/// ```
pub fn sort_tags_descending(tags: &mut [String]) {
    tags.sort_by(|a, b| {
        match (parse_version(a), parse_version(b)) {
            (Some(v_a), Some(v_b)) => v_b.cmp(&v_a), // Reverse for descending
            (Some(_), None) => Ordering::Less,       // Valid versions come first
            (None, Some(_)) => Ordering::Greater,
            (None, None) => b.cmp(a), // Fallback to string comparison
        }
    });
}

/// Compute semantic version tags from a version string
///
/// Returns `[major, major.minor, major.minor.patch]` and optionally `latest` for stable versions.
/// Pre-release versions (with pre-release identifiers) do not include `latest`.
///
/// # Examples
///
/// ```rust
/// use crucible_core::semver_utils::compute_semantic_tags;
///
/// let tags = compute_semantic_tags("1.2.3");
/// assert_eq!(tags, vec!["1", "1.2", "1.2.3", "latest"]);
///
/// let tags = compute_semantic_tags("2.0.0-rc.1");
/// assert_eq!(tags, vec!["2", "2.0", "2.0.0-rc.1"]);
///
/// // Invalid versions return only "latest"
/// let tags = compute_semantic_tags("invalid");
/// assert_eq!(tags, vec!["latest"]);
/// ```
pub fn compute_semantic_tags(version: &str) -> Vec<String> {
    let version = parse_version(version);
    if version.is_none() {
        return vec!["latest".to_string()];
    }

    let version = version.unwrap();
    let mut tags = vec![
        format!("{}", version.major),
        format!("{}.{}", version.major, version.minor),
        version.to_string(),
    ];

    // Only include "latest" for stable releases (no pre-release identifiers)
    if version.pre.is_empty() {
        tags.push("latest".to_string());
    }

    tags
}

/// Compute the tags that must be (re)pushed when publishing `version`,
/// given the registry's currently published tags (§4.2 "Semver tag
/// expansion").
///
/// The candidate set is `{major, major.minor, exact, "latest"}`; a candidate
/// is included only when `version` is strictly greater than the maximum
/// published tag satisfying that candidate's range. `exact` is always
/// included. `latest` is never included for a pre-release version.
///
/// # Examples
///
/// ```rust
/// use crucible_core::semver_utils::semver_expand;
///
/// let published = vec![
///     "1".to_string(), "1.0".to_string(), "1.0.0".to_string(),
///     "2".to_string(), "2.0".to_string(), "2.0.0".to_string(),
///     "latest".to_string(),
/// ];
/// assert_eq!(semver_expand("2.1.0", &published), vec!["2", "2.1", "2.1.0", "latest"]);
/// assert_eq!(semver_expand("1.0.1", &published), vec!["1", "1.0", "1.0.1"]);
/// ```
pub fn semver_expand(version: &str, published: &[String]) -> Vec<String> {
    let Some(v) = parse_version(version) else {
        return vec![version.to_string()];
    };
    let published_versions: Vec<Version> =
        published.iter().filter_map(|t| parse_version(t)).collect();

    let max_matching = |pred: &dyn Fn(&Version) -> bool| -> Option<Version> {
        published_versions.iter().filter(|p| pred(p)).max().cloned()
    };

    let mut tags = Vec::new();

    let major_max = max_matching(&|p: &Version| p.major == v.major);
    if major_max.as_ref().map(|m| &v > m).unwrap_or(true) {
        tags.push(format!("{}", v.major));
    }

    let minor_max = max_matching(&|p: &Version| p.major == v.major && p.minor == v.minor);
    if minor_max.as_ref().map(|m| &v > m).unwrap_or(true) {
        tags.push(format!("{}.{}", v.major, v.minor));
    }

    tags.push(v.to_string());

    if v.pre.is_empty() {
        let overall_max = published_versions.iter().max();
        if overall_max.map(|m| &v > m).unwrap_or(true) {
            tags.push("latest".to_string());
        }
    }

    tags
}

/// Compare two version tags
///
/// Returns `Ordering::Greater` if a > b, `Ordering::Less` if a < b, `Ordering::Equal` if equal.
/// Valid semantic versions are considered greater than non-semantic versions.
///
/// # Examples
///
/// ```rust
/// use crucible_core::semver_utils::compare_versions;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare_versions("1.2.3", "1.2.4"), Ordering::Less);
/// assert_eq!(compare_versions("2.0.0", "1.9.9"), Ordering::Greater);
/// assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);
///
/// // Valid version is greater than invalid
/// assert_eq!(compare_versions("1.0.0", "invalid"), Ordering::Greater);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(v_a), Some(v_b)) => v_a.cmp(&v_b),
        (Some(_), None) => Ordering::Greater, // Valid version is greater than invalid
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b), // Fallback to string comparison
    }
}
