//! `features package` — tar a local Feature folder and write the archive.

use super::shared::FeaturesResult;
use anyhow::{Context, Result};
use crucible_core::publisher::package_feature;
use std::path::Path;

pub fn execute_features_package(path: &Path, output: &Path, json: bool) -> Result<()> {
    let (feature, tar_bytes) = package_feature(path)
        .with_context(|| format!("failed to package feature at '{}'", path.display()))?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    std::fs::write(output, &tar_bytes)
        .with_context(|| format!("failed to write archive to '{}'", output.display()))?;

    let mut result = FeaturesResult::ok("features package");
    result.size = Some(tar_bytes.len() as u64);
    result.message = Some(format!(
        "packaged '{}' (version {}) to {}",
        feature.id,
        feature.version.as_deref().unwrap_or("unknown"),
        output.display()
    ));
    result.cache_path = Some(output.display().to_string());
    result.print(json)
}
