//! `features publish` — package and push a local Feature folder to an OCI
//! registry.

use super::shared::FeaturesResult;
use anyhow::{anyhow, Context, Result};
use crucible_core::oci::ReqwestClient;
use crucible_core::publisher::Publisher;
use std::path::Path;

pub async fn execute_features_publish(
    path: &Path,
    registry: &str,
    namespace: &str,
    json: bool,
) -> Result<()> {
    let http = ReqwestClient::new().map_err(|e| anyhow!("failed to build HTTP client: {e}"))?;
    let publisher = Publisher::new(http);

    let results = publisher
        .publish_feature(registry, namespace, path)
        .await
        .with_context(|| format!("failed to publish feature at '{}'", path.display()))?;

    let tags: Vec<String> = results.iter().map(|r| r.tag.clone()).collect();
    let mut result = FeaturesResult::ok("features publish");
    result.digest = results.first().map(|r| r.digest.clone());
    result.size = results.first().map(|r| r.size);
    result.message = Some(format!(
        "published {} to {registry}/{namespace} under tags [{}]",
        path.display(),
        tags.join(", ")
    ));
    result.print(json)
}
