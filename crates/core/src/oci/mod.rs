//! OCI registry integration for DevContainer features.
//!
//! Implements OCI Distribution Spec v2 operations needed to fetch and
//! publish devcontainer features: manifest/blob/tag reads, blob/manifest
//! pushes, and bearer-token auth with a Basic→Bearer challenge exchange.
//!
//! ## Authentication
//!
//! Credentials are loaded with the following precedence:
//!
//! 1. `CRUCIBLE_REGISTRY_TOKEN` / `CRUCIBLE_REGISTRY_USER`+`CRUCIBLE_REGISTRY_PASS`
//! 2. `GITHUB_TOKEN` (scoped to `ghcr.io`) and `DEVCONTAINERS_OCI_AUTH`
//!    (`registry:token` pairs, comma-separated)
//! 3. `~/.docker/config.json`
//! 4. No authentication, for public registries
//!
//! ## Semantic Version Utilities
//!
//! The `semver_utils` module parses, sorts, and expands semantic version
//! tags (e.g. publishing `1.2.3` also tags `1`, `1.2`, and `latest` when
//! appropriate).

mod auth;
mod client;
mod fetcher;
mod types;
mod utils;

pub use auth::{RegistryAuth, RegistryCredentials};
pub use client::{HttpClient, MockHttpClient, OciClient, ReqwestClient};
pub use fetcher::{deprecated_alias, rewrite_deprecated_aliases, ArtifactFetcher};
pub use types::{
    CollectionFeature, CollectionMetadata, CollectionSourceInfo, FeatureRef,
    HttpResponse, Layer, Manifest, ManifestConfig, PublishResult, TagList,
    DEVCONTAINERS_CONFIG_MEDIA_TYPE, DEVCONTAINERS_LAYER_MEDIA_TYPE, EMPTY_CONFIG_DIGEST,
    OCI_MANIFEST_MEDIA_TYPE,
};
pub use utils::{canonical_id, get_features_cache_dir};

pub use crate::semver_utils;
