//! Utility functions for OCI operations.

use sha2::{Digest, Sha256};
use std::path::PathBuf;

use super::types::Manifest;
use crate::errors::{CrucibleError, OciError, Result};
use crate::retry::RetryDecision;

/// Error classifier for OCI network operations: retry on transient
/// transport/auth failures, stop on anything that won't change on retry.
pub(crate) fn classify_oci_network_error(error: &OciError) -> RetryDecision {
    match error {
        OciError::Network { .. } => RetryDecision::Retry,
        OciError::Authentication { .. } => RetryDecision::Retry,
        OciError::Http { .. } => RetryDecision::Retry,
        OciError::ManifestNotFound { .. }
        | OciError::Malformed { .. }
        | OciError::NotAnOciReference { .. } => RetryDecision::Stop,
    }
}

/// Get the default cache directory for features.
///
/// Uses the standard cache directory with a 'features' subdirectory for persistent
/// feature caching across workspace sessions.
///
/// # Examples
///
/// ```
/// use crucible_core::oci::get_features_cache_dir;
/// let cache_dir = get_features_cache_dir().expect("failed to get features cache dir");
/// assert!(cache_dir.ends_with("features"));
/// ```
pub fn get_features_cache_dir() -> Result<PathBuf> {
    let base_cache = crate::progress::get_cache_dir()?;
    let features_cache = base_cache.join("features");

    if !features_cache.exists() {
        std::fs::create_dir_all(&features_cache)?;
    }

    Ok(features_cache)
}

/// Compute the canonical ID (SHA256 digest) of an OCI manifest.
///
/// The canonical ID is the SHA256 hash of the manifest's serialized JSON
/// representation, hashed over the exact bytes that get pushed to the
/// registry. This serves as the manifest's content address.
pub fn canonical_id(manifest: &Manifest) -> Result<String> {
    let manifest_json = serde_json::to_vec(manifest).map_err(|e| {
        CrucibleError::Oci(OciError::Malformed {
            message: format!("failed to serialize manifest: {e}"),
        })
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&manifest_json);
    Ok(format!("sha256:{:x}", hasher.finalize()))
}
