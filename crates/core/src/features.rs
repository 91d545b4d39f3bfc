//! The Feature data model (§3): the installable unit, its option schema, and
//! the `FeatureSet` a single reference resolves to.

use crate::errors::{CrucibleError, FetchError};
use crate::feature_ref::SourceInformation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// A bound option value; Features only ever declare boolean or string options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    String(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Declared shape of one of a Feature's options (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OptionSchema {
    #[serde(rename = "boolean")]
    Boolean {
        #[serde(default)]
        default: Option<bool>,
        #[serde(default)]
        description: Option<String>,
    },
    #[serde(rename = "string")]
    String {
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        r#enum: Option<Vec<String>>,
        #[serde(default)]
        proposals: Option<Vec<String>>,
    },
}

impl OptionSchema {
    pub fn default_value(&self) -> Option<OptionValue> {
        match self {
            OptionSchema::Boolean { default, .. } => default.map(OptionValue::Boolean),
            OptionSchema::String { default, .. } => {
                default.as_ref().map(|s| OptionValue::String(s.clone()))
            }
        }
    }

    pub fn validate_value(&self, value: &OptionValue) -> Result<(), String> {
        match (self, value) {
            (OptionSchema::Boolean { .. }, OptionValue::Boolean(_)) => Ok(()),
            (OptionSchema::String { r#enum, .. }, OptionValue::String(s)) => {
                if let Some(allowed) = r#enum {
                    if allowed.contains(s) {
                        Ok(())
                    } else {
                        Err(format!(
                            "value '{}' is not one of the allowed values: {:?}",
                            s, allowed
                        ))
                    }
                } else {
                    Ok(())
                }
            }
            _ => Err("type mismatch between option schema and provided value".to_string()),
        }
    }
}

/// The installable unit (§3). Schema fields come from `devcontainer-feature.json`
/// (or a v1 collection entry); runtime fields are attached during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub documentation_url: Option<String>,
    #[serde(default)]
    pub license_url: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, OptionSchema>,
    #[serde(default)]
    pub container_env: HashMap<String, String>,
    #[serde(default)]
    pub mounts: Vec<String>,
    #[serde(default)]
    pub init: Option<bool>,
    #[serde(default)]
    pub privileged: Option<bool>,
    #[serde(default)]
    pub cap_add: Vec<String>,
    #[serde(default)]
    pub security_opt: Vec<String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub installs_after: Vec<String>,
    #[serde(default)]
    pub legacy_ids: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub on_create_command: Option<serde_json::Value>,
    #[serde(default)]
    pub update_content_command: Option<serde_json::Value>,
    #[serde(default)]
    pub post_create_command: Option<serde_json::Value>,
    #[serde(default)]
    pub post_start_command: Option<serde_json::Value>,
    #[serde(default)]
    pub post_attach_command: Option<serde_json::Value>,

    // Runtime fields, attached during resolution — absent from the JSON on disk.
    #[serde(skip)]
    pub cache_path: Option<PathBuf>,
    #[serde(skip)]
    pub consecutive_id: Option<u64>,
    #[serde(skip)]
    pub value: HashMap<String, OptionValue>,
    #[serde(skip)]
    pub included: bool,
}

impl Feature {
    /// A Feature with only `id` set and every other field at its default —
    /// used by callers assembling fixtures (graph/resolver tests, etc.).
    pub fn minimal(id: &str) -> Self {
        Self {
            id: id.to_string(),
            version: None,
            name: None,
            description: None,
            documentation_url: None,
            license_url: None,
            options: HashMap::new(),
            container_env: HashMap::new(),
            mounts: vec![],
            init: None,
            privileged: None,
            cap_add: vec![],
            security_opt: vec![],
            entrypoint: None,
            installs_after: vec![],
            legacy_ids: vec![],
            deprecated: false,
            on_create_command: None,
            update_content_command: None,
            post_create_command: None,
            post_start_command: None,
            post_attach_command: None,
            cache_path: None,
            consecutive_id: None,
            value: HashMap::new(),
            included: false,
        }
    }

    pub fn has_lifecycle_commands(&self) -> bool {
        self.on_create_command.is_some()
            || self.update_content_command.is_some()
            || self.post_create_command.is_some()
            || self.post_start_command.is_some()
            || self.post_attach_command.is_some()
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if self.id.is_empty() {
            return Err(FetchError::MetadataParse {
                message: "feature id is required and cannot be empty".to_string(),
            });
        }
        for (option_name, option_def) in &self.options {
            if let Some(default_value) = option_def.default_value() {
                if let Err(err) = option_def.validate_value(&default_value) {
                    return Err(FetchError::MetadataParse {
                        message: format!(
                            "default value for option '{}' is invalid: {}",
                            option_name, err
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Merge the user's declared options over this metadata's defaults —
    /// the user's `value` always wins (§4.3).
    pub fn merge_user_value(&mut self, user_value: HashMap<String, OptionValue>) {
        for (key, schema) in &self.options {
            if !user_value.contains_key(key) {
                if let Some(default) = schema.default_value() {
                    self.value.insert(key.clone(), default);
                }
            }
        }
        self.value.extend(user_value);
    }
}

/// A set of one or more Features sharing a source reference (§3).
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub features: Vec<Feature>,
    pub source_information: SourceInformation,
    pub internal_version: String,
    pub computed_digest: Option<String>,
}

impl FeatureSet {
    pub fn is_v2(&self) -> bool {
        self.internal_version == "2"
    }
}

/// A Feature attached to its resolved cache location and unique install
/// identifier — the Installation-Order Resolver's unit of output.
#[derive(Debug, Clone)]
pub struct ResolvedFeature {
    pub feature: Feature,
    pub feature_set: FeatureSetRef,
    pub cache_path: PathBuf,
    pub consecutive_id: u64,
}

/// Lightweight handle back to the owning `FeatureSet`'s shared fields,
/// avoiding a back-pointer cycle (§9 "Cyclic-reference avoidance").
#[derive(Debug, Clone)]
pub struct FeatureSetRef {
    pub internal_version: String,
    pub computed_digest: Option<String>,
}

/// The ordered output of the Installation-Order Resolver, ready for the
/// Image-Layer Synthesizer.
#[derive(Debug, Clone)]
pub struct InstallationPlan {
    pub ordered: Vec<ResolvedFeature>,
}

/// Parse a v2 `devcontainer-feature.json` file.
#[instrument(level = "debug", skip(path))]
pub fn parse_feature_metadata(path: &Path) -> Result<Feature, CrucibleError> {
    debug!("parsing feature metadata from {}", path.display());

    if !path.exists() {
        return Err(FetchError::MetadataNotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let content = std::fs::read_to_string(path).map_err(FetchError::Io)?;
    let metadata: Feature = serde_json::from_str(&content).map_err(|e| FetchError::MetadataParse {
        message: e.to_string(),
    })?;

    debug!(id = %metadata.id, name = ?metadata.name, "parsed feature");
    metadata.validate()?;

    Ok(metadata)
}

/// Parse a v1 collection file (`devcontainer-features.json`) and select the
/// entry whose `id` matches.
pub fn parse_feature_from_collection(
    path: &Path,
    id: &str,
) -> Result<Feature, CrucibleError> {
    let content = std::fs::read_to_string(path).map_err(FetchError::Io)?;
    let collection: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| FetchError::MetadataParse {
            message: e.to_string(),
        })?;

    let features = collection
        .get("features")
        .and_then(|v| v.as_array())
        .ok_or_else(|| FetchError::MetadataParse {
            message: "collection file is missing a 'features' array".to_string(),
        })?;

    for entry in features {
        if entry.get("id").and_then(|v| v.as_str()) == Some(id) {
            let feature: Feature =
                serde_json::from_value(entry.clone()).map_err(|e| FetchError::MetadataParse {
                    message: e.to_string(),
                })?;
            return Ok(feature);
        }
    }

    Err(FetchError::MetadataNotFound {
        path: format!("{} (no entry with id '{}')", path.display(), id),
    }
    .into())
}
