//! Types and helpers shared across the `features` subcommands.

use serde::{Deserialize, Serialize};

/// Uniform JSON/human result shape for every `features` subcommand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesResult {
    pub command: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,
}

impl FeaturesResult {
    pub fn ok(command: &str) -> Self {
        Self {
            command: command.to_string(),
            status: "success".to_string(),
            digest: None,
            size: None,
            message: None,
            cache_path: None,
        }
    }

    pub fn print(&self, json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
        } else {
            println!("{}: {}", self.command, self.status);
            if let Some(cache_path) = &self.cache_path {
                println!("  cache path: {cache_path}");
            }
            if let Some(digest) = &self.digest {
                println!("  digest: {digest}");
            }
            if let Some(size) = self.size {
                println!("  size: {size} bytes");
            }
            if let Some(message) = &self.message {
                println!("  {message}");
            }
        }
        Ok(())
    }
}

/// A deterministic, filesystem-safe directory name for a Feature reference,
/// used to key its cache entry under the shared Features cache directory.
pub fn cache_key_for(user_feature_id: &str) -> String {
    user_feature_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
