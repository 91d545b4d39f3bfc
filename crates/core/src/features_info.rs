//! Data contracts for Features Info subcommand output
//!
//! This module defines the JSON serialization structures used by the
//! `crucible features info` subcommand for both text and JSON output formats.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// JSON output structure for verbose features info
/// Contains manifest, canonicalId, and publishedTags fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerboseJson {
    /// The OCI manifest JSON
    pub manifest: serde_json::Value,
    /// The canonical identifier (digest) or null for local features
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
    /// List of published tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub published_tags: Vec<String>,
    /// Error information for partial failures
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: std::collections::HashMap<String, String>,
}

/// JSON output structure for published tags info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedTagsJson {
    /// List of published tags
    pub published_tags: Vec<String>,
}

/// JSON output structure for manifest and canonical ID info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestJson {
    /// The OCI manifest JSON
    pub manifest: serde_json::Value,
    /// The canonical identifier (digest) or null for local features
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
}
