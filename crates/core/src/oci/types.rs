//! Core OCI wire types for DevContainer features.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use crate::feature_ref::FeatureRef;

/// Result of publishing an artifact to an OCI registry.
#[derive(Debug, Clone)]
pub struct PublishResult {
    pub registry: String,
    pub repository: String,
    pub tag: String,
    pub digest: String,
    pub size: u64,
}

/// OCI manifest structure (§3 `OCIManifest`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub config: ManifestConfig,
    pub layers: Vec<Layer>,
}

/// The (always-empty) config descriptor devcontainer manifests carry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestConfig {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

/// OCI layer structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Layer {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub size: u64,
    pub digest: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

/// The empty-config digest every devcontainer manifest references:
/// `sha256` of zero bytes.
pub const EMPTY_CONFIG_DIGEST: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub const DEVCONTAINERS_CONFIG_MEDIA_TYPE: &str = "application/vnd.devcontainers";
pub const DEVCONTAINERS_LAYER_MEDIA_TYPE: &str = "application/vnd.devcontainers.layer.v1+tar";
pub const OCI_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// OCI tag list response structure.
#[derive(Debug, Deserialize, Serialize)]
pub struct TagList {
    pub name: String,
    pub tags: Vec<String>,
}

/// DevContainer collection metadata structure (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_information: Option<CollectionSourceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<CollectionFeature>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSourceInfo {
    pub provider: String,
    pub repository: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionFeature {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}
