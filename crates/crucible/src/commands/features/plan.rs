//! `features plan` — fetch a set of Feature references and compute their
//! installation order.

use super::shared::cache_key_for;
use anyhow::{anyhow, Context, Result};
use crucible_core::feature_ref::parse_feature_reference;
use crucible_core::oci::{get_features_cache_dir, ArtifactFetcher, ReqwestClient};
use crucible_core::order_resolver::resolve_installation_order;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Installation order, in the shape a caller would persist or diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesPlanResult {
    pub order: Vec<String>,
}

pub async fn execute_features_plan(
    feature_refs: &[String],
    config_folder: &PathBuf,
    json_output: bool,
) -> Result<()> {
    if feature_refs.is_empty() {
        return Err(anyhow!("'features plan' requires at least one feature reference"));
    }

    let http = ReqwestClient::new().map_err(|e| anyhow!("failed to build HTTP client: {e}"))?;
    let fetcher = ArtifactFetcher::new(http);
    let cache_dir = get_features_cache_dir()?;

    let mut feature_sets = Vec::with_capacity(feature_refs.len());
    for feature_ref in feature_refs {
        let source = parse_feature_reference(feature_ref, config_folder)
            .with_context(|| format!("failed to classify feature reference '{feature_ref}'"))?;
        let dest_dir = cache_dir.join(cache_key_for(source.user_feature_id()));
        let feature_set = fetcher
            .fetch(&source, &dest_dir, None)
            .await
            .with_context(|| format!("failed to fetch feature reference '{feature_ref}'"))?;
        feature_sets.push(feature_set);
    }

    let plan = resolve_installation_order(&feature_sets)
        .map_err(|e| anyhow!("could not compute an installation order: {e}"))?;

    let order: Vec<String> = plan
        .ordered
        .iter()
        .map(|resolved| resolved.feature.id.clone())
        .collect();

    let result = FeaturesPlanResult { order };
    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("features plan: success");
        for (i, id) in result.order.iter().enumerate() {
            println!("  {}. {id}", i + 1);
        }
    }
    Ok(())
}
