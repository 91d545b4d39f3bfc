//! Artifact Fetcher (§4.3): given a classified reference and a destination
//! directory, produces a populated cache directory and a computed digest.

use bytes::Bytes;
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::errors::{FetchError, OciError};
use crate::feature_ref::{FeatureRef, SourceInformation};
use crate::features::{parse_feature_from_collection, parse_feature_metadata, Feature, FeatureSet};
use crate::lockfile::LockfileFeature;
use crate::retry::{retry_async, RetryConfig};

use super::client::{HttpClient, OciClient};

/// Rewrites the deprecated short ids a configuration may still declare to
/// their canonical OCI form (§4.3 "Deprecated-alias rewriting"). Each entry is
/// `(legacy_id, canonical_namespace, canonical_id, folded_options)`;
/// `folded_options` are merged into the target Feature's options (creating it
/// if the user hadn't already declared it).
const DEPRECATED_ALIASES: &[(&str, &str, &str, &[(&str, &str)])] = &[
    ("node", "devcontainers/features", "node", &[]),
    ("go", "devcontainers/features", "go", &[]),
    ("golang", "devcontainers/features", "go", &[]),
    ("common", "devcontainers/features", "common-utils", &[]),
    ("common-utils", "devcontainers/features", "common-utils", &[]),
    (
        "gradle",
        "devcontainers/features",
        "java",
        &[("installGradle", "true")],
    ),
    (
        "maven",
        "devcontainers/features",
        "java",
        &[("installMaven", "true")],
    ),
    (
        "jupyterlab",
        "devcontainers/features",
        "python",
        &[("installJupyterlab", "true")],
    ),
];

/// Look up a deprecated alias by its legacy id.
pub fn deprecated_alias(
    id: &str,
) -> Option<(&'static str, &'static str, &'static [(&'static str, &'static str)])> {
    DEPRECATED_ALIASES
        .iter()
        .find(|(legacy, _, _, _)| *legacy == id)
        .map(|(_, namespace, canonical, folded)| (*namespace, *canonical, *folded))
}

/// Given the user's declared `{id -> options}` map, rewrite deprecated
/// aliases: fold their options into the canonical target (creating it if
/// absent) and drop the legacy entry. Returns rewrite warnings to surface.
pub fn rewrite_deprecated_aliases(
    declared: &mut indexmap::IndexMap<String, HashMap<String, String>>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let legacy_ids: Vec<String> = declared
        .keys()
        .filter(|id| deprecated_alias(id).is_some())
        .cloned()
        .collect();

    for legacy_id in legacy_ids {
        let Some((_, canonical, folded)) = deprecated_alias(&legacy_id) else {
            continue;
        };
        let mut user_options = declared.shift_remove(&legacy_id).unwrap_or_default();
        for (key, value) in folded {
            user_options
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
        warnings.push(format!(
            "'{}' is deprecated; rewritten to '{}'",
            legacy_id, canonical
        ));
        declared
            .entry(canonical.to_string())
            .and_modify(|existing| existing.extend(user_options.clone()))
            .or_insert(user_options);
    }

    warnings
}

/// Fetches Feature artifacts for every classified source form and extracts
/// them into a cache directory.
pub struct ArtifactFetcher<C: HttpClient + Clone> {
    http: C,
    retry_config: RetryConfig,
}

impl<C: HttpClient + Clone> ArtifactFetcher<C> {
    pub fn new(http: C) -> Self {
        Self {
            http,
            retry_config: RetryConfig::default(),
        }
    }

    fn oci_client(&self) -> OciClient<C> {
        OciClient::new(self.http.clone())
    }

    /// Fetch a classified reference into `dest_dir`, returning the populated
    /// `FeatureSet` with its resolved Features and computed digest.
    #[instrument(level = "debug", skip(self, source, dest_dir, pinned_integrity))]
    pub async fn fetch(
        &self,
        source: &SourceInformation,
        dest_dir: &Path,
        pinned_integrity: Option<&LockfileFeature>,
    ) -> Result<FeatureSet, FetchError> {
        std::fs::create_dir_all(dest_dir)?;

        let computed_digest = match source {
            SourceInformation::Cached { .. } => self.fetch_cached(source, dest_dir).await?,
            SourceInformation::Oci { feature_ref, .. } => {
                self.fetch_oci(feature_ref, dest_dir, pinned_integrity).await?
            }
            SourceInformation::Tarball { url, .. } => self.fetch_tarball(url, dest_dir).await?,
            SourceInformation::GitRelease {
                owner, repo, id, tag, ..
            } => {
                self.fetch_git_release(owner, repo, id, tag, dest_dir)
                    .await?
            }
            SourceInformation::LocalPath { path, .. } => {
                self.fetch_local_path(path, dest_dir)?;
                None
            }
        };

        if let (Some(expected), Some(computed)) = (
            pinned_integrity.map(|l| l.integrity.as_str()),
            computed_digest.as_deref(),
        ) {
            if expected != computed {
                return Err(FetchError::Integrity {
                    expected: expected.to_string(),
                    computed: computed.to_string(),
                });
            }
        }

        let (mut features, internal_version) = self.load_metadata(dest_dir, source)?;
        for feature in &mut features {
            feature.cache_path = Some(dest_dir.to_path_buf());
        }

        Ok(FeatureSet {
            features,
            source_information: source.clone(),
            internal_version,
            computed_digest,
        })
    }

    async fn fetch_cached(
        &self,
        source: &SourceInformation,
        dest_dir: &Path,
    ) -> Result<Option<String>, FetchError> {
        let id = source.user_feature_id();
        let builtin_root = std::env::var("CRUCIBLE_BUILTIN_FEATURES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/usr/share/crucible/builtin-features"));
        let builtin_dir = builtin_root.join(id);

        if !builtin_dir.exists() {
            return Err(FetchError::MetadataNotFound {
                path: builtin_dir.display().to_string(),
            });
        }

        copy_tree(&builtin_dir, dest_dir)?;
        Ok(None)
    }

    async fn fetch_oci(
        &self,
        feature_ref: &FeatureRef,
        dest_dir: &Path,
        pinned_integrity: Option<&LockfileFeature>,
    ) -> Result<Option<String>, FetchError> {
        let client = self.oci_client();
        let reference = match pinned_integrity {
            Some(l) => l
                .resolved
                .rsplit_once('@')
                .map(|(_, digest)| digest.to_string())
                .ok_or_else(|| {
                    FetchError::Oci(OciError::Malformed {
                        message: format!(
                            "lockfile resolved reference '{}' has no @digest suffix",
                            l.resolved
                        ),
                    })
                })?,
            None => feature_ref.version.clone(),
        };

        let manifest = retry_async(
            &self.retry_config,
            || async {
                client
                    .get_manifest(&feature_ref.registry, &feature_ref.path, &reference)
                    .await
                    .map_err(FetchError::Oci)
            },
            classify_oci_error,
        )
        .await?
        .ok_or_else(|| {
            FetchError::Oci(OciError::ManifestNotFound {
                reference: feature_ref.reference(),
            })
        })?;

        let layer = manifest.layers.first().ok_or_else(|| {
            FetchError::Oci(OciError::Malformed {
                message: "manifest has no layers".to_string(),
            })
        })?;

        let blob = retry_async(
            &self.retry_config,
            || async {
                client
                    .get_blob(&feature_ref.registry, &feature_ref.path, &layer.digest)
                    .await
                    .map_err(FetchError::Oci)
            },
            classify_oci_error,
        )
        .await?;

        let digest = format!("sha256:{:x}", Sha256::digest(&blob));
        extract_tar(&blob, dest_dir, None)?;

        Ok(Some(digest))
    }

    async fn fetch_tarball(&self, url: &str, dest_dir: &Path) -> Result<Option<String>, FetchError> {
        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "application/octet-stream".to_string());
        if url.contains("github.com") {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                headers.insert("Authorization".to_string(), format!("Bearer {}", token));
            }
        }

        let bytes = self.http.get_with_headers(url, headers).await.map_err(|e| {
            FetchError::Oci(OciError::Network {
                method: "GET".to_string(),
                url: url.to_string(),
                message: e.to_string(),
            })
        })?;

        let digest = format!("sha256:{:x}", Sha256::digest(&bytes));
        let archive_name = url.rsplit('/').next().unwrap_or("archive").to_string();
        extract_tar(&bytes, dest_dir, Some(&archive_name))?;

        Ok(Some(digest))
    }

    async fn fetch_git_release(
        &self,
        owner: &str,
        repo: &str,
        id: &str,
        tag: &str,
        dest_dir: &Path,
    ) -> Result<Option<String>, FetchError> {
        let candidates = self.git_release_candidate_urls(owner, repo, id, tag).await;

        for url in &candidates {
            let mut headers = HashMap::new();
            headers.insert("Accept".to_string(), "application/octet-stream".to_string());
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                headers.insert("Authorization".to_string(), format!("Bearer {}", token));
            }

            match self.http.get_with_headers(url, headers).await {
                Ok(bytes) => {
                    let digest = format!("sha256:{:x}", Sha256::digest(&bytes));
                    extract_tar(&bytes, dest_dir, None)?;
                    return Ok(Some(digest));
                }
                Err(e) => {
                    debug!(url, error = %e, "git-release candidate failed, trying next");
                }
            }
        }

        Err(FetchError::FetchFallbackExhausted {
            id: id.to_string(),
            attempts: candidates.len(),
        })
    }

    /// Build the ordered candidate URL list (§4.3): a token-resolved release
    /// asset URL first (when a token is available), then the unauthenticated
    /// v2 and v1 download URLs as fallbacks.
    async fn git_release_candidate_urls(
        &self,
        owner: &str,
        repo: &str,
        id: &str,
        tag: &str,
    ) -> Vec<String> {
        let mut candidates = Vec::new();

        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            let api_url = format!(
                "https://api.github.com/repos/{}/{}/releases/tags/{}",
                owner, repo, tag
            );
            let mut headers = HashMap::new();
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
            headers.insert(
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            );

            if let Ok(body) = self.http.get_with_headers(&api_url, headers).await {
                if let Ok(release) = serde_json::from_slice::<serde_json::Value>(&body) {
                    if let Some(assets) = release.get("assets").and_then(|a| a.as_array()) {
                        let preferred = format!("devcontainer-feature-{}.tgz", id);
                        let fallback = "devcontainer-features.tgz";
                        let mut preferred_url = None;
                        let mut fallback_url = None;
                        for asset in assets {
                            let name = asset.get("name").and_then(|n| n.as_str()).unwrap_or("");
                            let url = asset.get("browser_download_url").and_then(|u| u.as_str());
                            if name == preferred {
                                preferred_url = url;
                            } else if name == fallback {
                                fallback_url = url;
                            }
                        }
                        if let Some(url) = preferred_url.or(fallback_url) {
                            candidates.push(url.to_string());
                        }
                    }
                }
            }
        }

        candidates.push(format!(
            "https://github.com/{}/{}/releases/download/{}/devcontainer-feature-{}.tgz",
            owner, repo, tag, id
        ));
        candidates.push(format!(
            "https://github.com/{}/{}/releases/download/{}/devcontainer-features.tgz",
            owner, repo, tag
        ));

        candidates
    }

    fn fetch_local_path(&self, path: &Path, dest_dir: &Path) -> Result<(), FetchError> {
        copy_tree(path, dest_dir)
    }

    /// Locate and parse the Feature's metadata file, preferring the v2
    /// single-feature file and falling back to a v1 collection entry (§4.3).
    fn load_metadata(
        &self,
        dest_dir: &Path,
        source: &SourceInformation,
    ) -> Result<(Vec<Feature>, String), FetchError> {
        let v2_path = dest_dir.join("devcontainer-feature.json");
        if v2_path.exists() {
            let feature = parse_feature_metadata(&v2_path).map_err(to_fetch_error)?;
            return Ok((vec![feature], "2".to_string()));
        }

        let v1_path = dest_dir.join("devcontainer-features.json");
        if v1_path.exists() {
            let id = match source {
                SourceInformation::Oci { feature_ref, .. } => feature_ref.id.clone(),
                SourceInformation::Tarball { id, .. } => id.clone(),
                SourceInformation::GitRelease { id, .. } => id.clone(),
                _ => source.user_feature_id().to_string(),
            };
            let feature = parse_feature_from_collection(&v1_path, &id).map_err(to_fetch_error)?;
            return Ok((vec![feature], "1".to_string()));
        }

        Err(FetchError::MetadataNotFound {
            path: dest_dir.display().to_string(),
        })
    }
}

fn to_fetch_error(err: crate::errors::CrucibleError) -> FetchError {
    match err {
        crate::errors::CrucibleError::Fetch(fetch_err) => fetch_err,
        other => FetchError::MetadataParse {
            message: other.to_string(),
        },
    }
}

fn classify_oci_error(error: &FetchError) -> crate::retry::RetryDecision {
    use crate::retry::RetryDecision;
    match error {
        FetchError::Oci(OciError::Network { .. }) | FetchError::Oci(OciError::Http { .. }) => {
            RetryDecision::Retry
        }
        _ => RetryDecision::Stop,
    }
}

/// Extract tar bytes into `dest_dir`, skipping any entry whose path contains
/// one of the `ignore` substrings (§4.3).
fn extract_tar(
    bytes: &Bytes,
    dest_dir: &Path,
    archive_name: Option<&str>,
) -> Result<(), FetchError> {
    std::fs::create_dir_all(dest_dir)?;
    let archive_entry = archive_name.map(|name| format!("./{name}"));
    let mut archive = tar::Archive::new(bytes.as_ref());
    for entry in archive
        .entries()
        .map_err(|e| FetchError::Extraction { message: e.to_string() })?
    {
        let mut entry = entry.map_err(|e| FetchError::Extraction { message: e.to_string() })?;
        let path = entry
            .path()
            .map_err(|e| FetchError::Extraction { message: e.to_string() })?
            .to_string_lossy()
            .to_string();

        if path == "./."
            || path.starts_with("./.")
            || archive_entry.as_deref() == Some(path.as_str())
        {
            continue;
        }

        entry
            .unpack_in(dest_dir)
            .map_err(|e| FetchError::Extraction { message: e.to_string() })?;
    }
    Ok(())
}

/// Recursively copy a directory tree (used by `cached` and `local-path`).
fn copy_tree(src: &Path, dest: &Path) -> Result<(), FetchError> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest_path = dest.join(entry.file_name());
        if file_type.is_dir() {
            copy_tree(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

/// sha256 of a reader's full contents, used to verify idempotent re-fetches.
pub fn sha256_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("sha256:{:x}", hasher.finalize()))
}
