//! `features resolve` — classify and fetch a single Feature reference.

use super::shared::{cache_key_for, FeaturesResult};
use anyhow::{anyhow, Context, Result};
use crucible_core::feature_ref::parse_feature_reference;
use crucible_core::oci::{get_features_cache_dir, ArtifactFetcher, ReqwestClient};
use std::path::PathBuf;

pub async fn execute_features_resolve(
    feature_ref: &str,
    config_folder: &PathBuf,
    json: bool,
) -> Result<()> {
    let source = parse_feature_reference(feature_ref, config_folder)
        .with_context(|| format!("failed to classify feature reference '{feature_ref}'"))?;

    let dest_dir = get_features_cache_dir()?.join(cache_key_for(source.user_feature_id()));

    let http = ReqwestClient::new().map_err(|e| anyhow!("failed to build HTTP client: {e}"))?;
    let fetcher = ArtifactFetcher::new(http);
    let feature_set = fetcher
        .fetch(&source, &dest_dir, None)
        .await
        .with_context(|| format!("failed to fetch feature reference '{feature_ref}'"))?;

    let mut result = FeaturesResult::ok("features resolve");
    result.cache_path = Some(dest_dir.display().to_string());
    result.digest = feature_set.computed_digest.clone();
    result.message = Some(format!(
        "resolved {} feature(s) from {feature_ref} ({})",
        feature_set.features.len(),
        if feature_set.is_v2() { "v2" } else { "v1" }
    ));
    result.print(json)
}
