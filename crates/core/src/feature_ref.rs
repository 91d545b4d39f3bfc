//! Reference Parser — classifies a user-supplied Feature identifier into one
//! of `{cached, tarball, git-release, local-path, oci}` and, for the `oci`
//! arm, extracts the registry/owner/namespace/path/id/version components of
//! a [`FeatureRef`].
//!
//! Classification is a pure, synchronous function of the input string and
//! the configuration folder — it never makes a network call. Rule 4 of the
//! spec's classification order describes verifying an `oci` candidate by
//! fetching its manifest; that verification happens one stage later, in the
//! Artifact Fetcher, which already owns the OCI Client and the retry/fallback
//! policy. Here, an `oci` candidate is recognized syntactically by the
//! registry segment looking DNS-like (containing a `.` or a `:port`), which
//! is disjoint from the `<owner>/<repo>/<id>[@tag]` shape `git-release`
//! requires, so no reference is ambiguous between the two at parse time.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::errors::ReferenceError;
use crate::registry_parser::parse_registry_reference;

static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+([._-][a-z0-9]+)*(/[a-z0-9]+([._-][a-z0-9]+)*)*$").unwrap()
});
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$").unwrap());
static TARBALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^devcontainer-feature-([A-Za-z0-9_-]+)\.tgz$").unwrap());
static GIT_RELEASE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]*$").unwrap());

/// Immutable identifier for a Feature stored in an OCI registry (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureRef {
    pub registry: String,
    pub owner: String,
    /// Path below the registry, excluding the final `id` segment.
    pub namespace: String,
    /// `namespace` + `id`.
    pub path: String,
    /// `registry` + `path`.
    pub resource: String,
    pub id: String,
    /// Tag or `"latest"`; may also hold a `sha256:<hex>` digest.
    pub version: String,
}

impl FeatureRef {
    /// Build and validate a `FeatureRef` from its decomposed parts.
    /// All identifier segments are normalized to lowercase per §3.
    pub fn new(
        registry: impl Into<String>,
        namespace: impl Into<String>,
        id: impl Into<String>,
        version: Option<String>,
    ) -> Result<Self, ReferenceError> {
        let registry = registry.into().to_lowercase();
        let namespace = namespace.into().to_lowercase();
        let id = id.into().to_lowercase();
        let version = version.unwrap_or_else(|| "latest".to_string()).to_lowercase();

        let path = if namespace.is_empty() {
            id.clone()
        } else {
            format!("{}/{}", namespace, id)
        };

        if !PATH_RE.is_match(&path) {
            return Err(ReferenceError::InvalidReference {
                input: path.clone(),
                reason: "path must match ^[a-z0-9]+([._-][a-z0-9]+)*(/...)*$".to_string(),
            });
        }
        if !VERSION_RE.is_match(&version) && !version.starts_with("sha256:") {
            return Err(ReferenceError::InvalidReference {
                input: version.clone(),
                reason: "version must match ^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$".to_string(),
            });
        }

        let owner = namespace.split('/').next().unwrap_or(&namespace).to_string();
        let resource = format!("{}/{}", registry, path);

        Ok(Self {
            registry,
            owner,
            namespace,
            path,
            resource,
            id,
            version,
        })
    }

    pub fn tag(&self) -> &str {
        &self.version
    }

    pub fn repository(&self) -> String {
        self.path.clone()
    }

    pub fn reference(&self) -> String {
        format!("{}:{}", self.resource, self.version)
    }
}

/// The classified origin of a `userFeatureId`, carrying the original id for
/// diagnostics (§3 `SourceInformation`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInformation {
    Cached {
        user_feature_id: String,
    },
    Tarball {
        user_feature_id: String,
        url: String,
        id: String,
    },
    GitRelease {
        user_feature_id: String,
        owner: String,
        repo: String,
        id: String,
        tag: String,
    },
    LocalPath {
        user_feature_id: String,
        path: PathBuf,
    },
    Oci {
        user_feature_id: String,
        feature_ref: FeatureRef,
    },
}

impl SourceInformation {
    pub fn user_feature_id(&self) -> &str {
        match self {
            Self::Cached { user_feature_id }
            | Self::Tarball { user_feature_id, .. }
            | Self::GitRelease { user_feature_id, .. }
            | Self::LocalPath { user_feature_id, .. }
            | Self::Oci { user_feature_id, .. } => user_feature_id,
        }
    }
}

fn looks_dns_like(registry: &str) -> bool {
    if registry.contains('.') {
        return true;
    }
    if let Some(colon) = registry.find(':') {
        let port = &registry[colon + 1..];
        return !port.is_empty() && port.chars().all(|c| c.is_ascii_digit());
    }
    false
}

/// Classify `user_feature_id` per §4.1's ordered rules.
pub fn parse_feature_reference(
    user_feature_id: &str,
    config_folder: &Path,
) -> Result<SourceInformation, ReferenceError> {
    let raw = user_feature_id;

    // Rule 1: no '/' or '\' -> cached.
    if !raw.contains('/') && !raw.contains('\\') {
        return Ok(SourceInformation::Cached {
            user_feature_id: raw.to_string(),
        });
    }

    // Rule 2: http(s):// -> tarball (https only; http is rejected).
    if raw.strip_prefix("https://").is_some() {
        let filename = raw.rsplit('/').next().unwrap_or("");
        let id = TARBALL_RE
            .captures(filename)
            .map(|c| c[1].to_string())
            .ok_or_else(|| ReferenceError::InvalidTarballUrl {
                url: raw.to_string(),
            })?;
        return Ok(SourceInformation::Tarball {
            user_feature_id: raw.to_string(),
            url: raw.to_string(),
            id,
        });
    }
    if raw.starts_with("http://") {
        return Err(ReferenceError::InvalidReference {
            input: raw.to_string(),
            reason: "plain http:// is not supported, use https://".to_string(),
        });
    }

    // Rule 3: absolute or relative filesystem path -> local-path.
    if raw.starts_with('/') {
        return Err(ReferenceError::AbsolutePathNotSupported {
            path: raw.to_string(),
        });
    }
    if raw.starts_with("./") || raw.starts_with("../") {
        let devcontainer_folder = config_folder;
        let joined = devcontainer_folder.join(raw);
        let relative = pathdiff(&joined, devcontainer_folder);
        if relative.components().any(|c| c.as_os_str() == "..") {
            return Err(ReferenceError::PathEscape {
                path: raw.to_string(),
            });
        }
        return Ok(SourceInformation::LocalPath {
            user_feature_id: raw.to_string(),
            path: joined,
        });
    }

    // Rule 4: registry/namespace/name[:tag] where the registry component is
    // DNS-like -> oci.
    let (registry, namespace, name, tag) =
        parse_registry_reference(raw).map_err(|e| ReferenceError::InvalidReference {
            input: raw.to_string(),
            reason: e.to_string(),
        })?;
    if looks_dns_like(&registry) {
        let feature_ref = FeatureRef::new(registry, namespace, name, tag)?;
        return Ok(SourceInformation::Oci {
            user_feature_id: raw.to_string(),
            feature_ref,
        });
    }

    // Rule 5: <owner>/<repo>/<id>[@tag] -> git-release.
    let segments: Vec<&str> = raw.split('/').collect();
    if segments.len() == 3 && segments.iter().all(|s| !s.is_empty()) {
        let (id_part, tag) = match segments[2].split_once('@') {
            Some((id, tag)) => (id, tag.to_string()),
            None => (segments[2], "latest".to_string()),
        };
        if GIT_RELEASE_ID_RE.is_match(id_part) {
            return Ok(SourceInformation::GitRelease {
                user_feature_id: raw.to_string(),
                owner: segments[0].to_string(),
                repo: segments[1].to_string(),
                id: id_part.to_string(),
                tag,
            });
        }
    }

    Err(ReferenceError::InvalidGitRelease {
        input: raw.to_string(),
    })
}

/// Lightweight relative-path diff used for the `local-path` escape check:
/// `target` relative to `base`, without requiring either to exist on disk.
fn pathdiff(target: &Path, base: &Path) -> PathBuf {
    let target_components: Vec<_> = target.components().collect();
    let base_components: Vec<_> = base.components().collect();

    let common_len = target_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common_len..base_components.len() {
        result.push("..");
    }
    for component in &target_components[common_len..] {
        result.push(component.as_os_str());
    }
    result
}
