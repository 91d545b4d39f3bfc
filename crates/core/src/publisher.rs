//! Publisher (§4.6): the inverse of the Artifact Fetcher. Packages a local
//! Feature folder into a content-addressed OCI artifact, expands its
//! semver tag set, and pushes blobs + manifest under each resulting tag.

use crate::errors::PublishError;
use crate::features::Feature;
use crate::oci::{
    canonical_id, CollectionMetadata, HttpClient, Layer, Manifest, ManifestConfig, OciClient,
    PublishResult, DEVCONTAINERS_CONFIG_MEDIA_TYPE, DEVCONTAINERS_LAYER_MEDIA_TYPE,
    EMPTY_CONFIG_DIGEST, OCI_MANIFEST_MEDIA_TYPE,
};
use crate::semver_utils::semver_expand;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, instrument, warn};

/// Packages and publishes Feature folders to an OCI registry.
pub struct Publisher<C: HttpClient> {
    client: OciClient<C>,
}

impl<C: HttpClient> Publisher<C> {
    pub fn new(http: C) -> Self {
        Self {
            client: OciClient::new(http),
        }
    }

    /// Publish the Feature at `feature_dir`, expanding its semver tag set
    /// against whatever is already published under `namespace/<id>`.
    #[instrument(level = "info", skip(self), fields(registry, namespace))]
    pub async fn publish_feature(
        &self,
        registry: &str,
        namespace: &str,
        feature_dir: &Path,
    ) -> Result<Vec<PublishResult>, PublishError> {
        let (feature, tar_bytes) = package_feature(feature_dir)?;
        let path = format!("{}/{}", namespace, feature.id);

        let layer_digest = sha256_hex(&tar_bytes);
        let archive_name = format!("devcontainer-feature-{}.tgz", feature.id);
        let manifest = build_manifest(&layer_digest, tar_bytes.len() as u64, Some(&archive_name));
        let manifest_digest = canonical_id(&manifest)
            .map_err(|e| PublishError::Upload { message: e.to_string() })?;
        let manifest_bytes = Bytes::from(
            serde_json::to_vec(&manifest)
                .map_err(|e| PublishError::Upload { message: e.to_string() })?,
        );

        let published = self.client.list_tags(registry, &path).await?;
        let version = feature.version.as_deref().ok_or_else(|| {
            PublishError::MissingMetadata {
                path: feature_dir.display().to_string(),
                field: "version".to_string(),
            }
        })?;
        if published.iter().any(|t| t == version) {
            warn!(
                registry,
                path = %path,
                version,
                "exact version already published, skipping publish"
            );
            return Ok(Vec::new());
        }

        let tags = semver_expand(version, &published);

        if !self.client.check_blob_exists(registry, &path, &layer_digest).await? {
            let upload_path = self.client.post_upload_session(registry, &path).await?;
            self.client
                .put_blob(registry, &upload_path, &layer_digest, tar_bytes.clone())
                .await?;
        }

        let mut results = Vec::with_capacity(tags.len());
        for tag in &tags {
            let digest = self
                .client
                .put_manifest(registry, &path, tag, manifest_bytes.clone())
                .await?;
            if digest != manifest_digest {
                warn!(
                    expected = %manifest_digest,
                    got = %digest,
                    "registry returned a Docker-Content-Digest different from the computed manifest digest"
                );
            }
            info!(tag = %tag, digest = %digest, "published feature tag");
            results.push(PublishResult {
                registry: registry.to_string(),
                repository: path.clone(),
                tag: tag.clone(),
                digest,
                size: manifest_bytes.len() as u64,
            });
        }

        Ok(results)
    }

    /// Push `devcontainer-collection.json` under the namespace's fixed
    /// `latest` tag.
    #[instrument(level = "info", skip(self, collection))]
    pub async fn publish_collection_metadata(
        &self,
        registry: &str,
        namespace: &str,
        collection: &CollectionMetadata,
    ) -> Result<PublishResult, PublishError> {
        let collection_bytes = Bytes::from(
            serde_json::to_vec(collection)
                .map_err(|e| PublishError::Upload { message: e.to_string() })?,
        );
        let digest = sha256_hex(&collection_bytes);
        let manifest = build_manifest(&digest, collection_bytes.len() as u64, None);
        let manifest_bytes = Bytes::from(
            serde_json::to_vec(&manifest)
                .map_err(|e| PublishError::Upload { message: e.to_string() })?,
        );

        if !self
            .client
            .check_blob_exists(registry, namespace, &digest)
            .await?
        {
            let upload_path = self.client.post_upload_session(registry, namespace).await?;
            self.client
                .put_blob(registry, &upload_path, &digest, collection_bytes.clone())
                .await?;
        }

        let response_digest = self
            .client
            .put_manifest(registry, namespace, "latest", manifest_bytes.clone())
            .await?;

        Ok(PublishResult {
            registry: registry.to_string(),
            repository: namespace.to_string(),
            tag: "latest".to_string(),
            digest: response_digest,
            size: manifest_bytes.len() as u64,
        })
    }
}

/// Build the (always-empty-config) manifest for a single devcontainers
/// layer of `size` bytes content-addressed by `layer_digest`.
fn build_manifest(layer_digest: &str, size: u64, archive_title: Option<&str>) -> Manifest {
    let mut annotations = std::collections::HashMap::new();
    if let Some(title) = archive_title {
        annotations.insert(
            "org.opencontainers.image.title".to_string(),
            title.to_string(),
        );
    }
    Manifest {
        schema_version: 2,
        media_type: OCI_MANIFEST_MEDIA_TYPE.to_string(),
        config: ManifestConfig {
            media_type: DEVCONTAINERS_CONFIG_MEDIA_TYPE.to_string(),
            digest: EMPTY_CONFIG_DIGEST.to_string(),
            size: 0,
        },
        layers: vec![Layer {
            media_type: DEVCONTAINERS_LAYER_MEDIA_TYPE.to_string(),
            size,
            digest: layer_digest.to_string(),
            annotations,
        }],
    }
}

/// Validate and tar a local Feature folder: requires `devcontainer-feature.json`
/// with non-empty `id` and `version`.
pub fn package_feature(feature_dir: &Path) -> Result<(Feature, Bytes), PublishError> {
    let metadata_path = feature_dir.join("devcontainer-feature.json");
    if !metadata_path.exists() {
        return Err(PublishError::MissingMetadata {
            path: feature_dir.display().to_string(),
            field: "devcontainer-feature.json".to_string(),
        });
    }
    let content = std::fs::read_to_string(&metadata_path)?;
    let feature: Feature = serde_json::from_str(&content).map_err(|e| PublishError::Upload {
        message: format!("malformed devcontainer-feature.json: {e}"),
    })?;
    if feature.id.is_empty() {
        return Err(PublishError::MissingMetadata {
            path: metadata_path.display().to_string(),
            field: "id".to_string(),
        });
    }
    if feature.version.is_none() {
        return Err(PublishError::MissingMetadata {
            path: metadata_path.display().to_string(),
            field: "version".to_string(),
        });
    }

    let tar_bytes = tar_directory(feature_dir)?;
    Ok((feature, tar_bytes))
}

/// Tar `dir`'s contents (uncompressed, relative paths) into an in-memory
/// archive — the same encoding the fetcher extracts with `tar::Archive`.
fn tar_directory(dir: &Path) -> Result<Bytes, PublishError> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.append_dir_all(".", dir)?;
    let bytes = builder.into_inner()?;
    Ok(Bytes::from(bytes))
}

fn sha256_hex(bytes: &Bytes) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}
