//! Error types for the Features subsystem
//!
//! Each pipeline stage gets its own error enum so callers can match on the
//! failure mode instead of string-sniffing; `CrucibleError` aggregates them
//! at the boundary the CLI crate consumes.

use thiserror::Error;

/// Reference Parser failures (§4.1).
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("invalid feature reference '{input}': {reason}")]
    InvalidReference { input: String, reason: String },

    #[error("tarball URL '{url}' does not match the required '.../devcontainer-feature-<id>.tgz' shape")]
    InvalidTarballUrl { url: String },

    #[error("local path '{path}' escapes the configuration's .devcontainer folder")]
    PathEscape { path: String },

    #[error("absolute paths are not supported: '{path}'")]
    AbsolutePathNotSupported { path: String },

    #[error("git-release reference '{input}' must have the shape <owner>/<repo>/<id>[@<tag>]")]
    InvalidGitRelease { input: String },
}

/// OCI Client failures (§4.2), tagged with the method and URL that failed.
#[derive(Error, Debug)]
pub enum OciError {
    #[error("{method} {url} failed: {message}")]
    Http {
        method: String,
        url: String,
        message: String,
    },

    #[error("network error during {method} {url}: {message}")]
    Network {
        method: String,
        url: String,
        message: String,
    },

    #[error("authentication failed for registry '{registry}': {message}")]
    Authentication { registry: String, message: String },

    #[error("manifest not found for {reference}")]
    ManifestNotFound { reference: String },

    #[error("registry response malformed: {message}")]
    Malformed { message: String },

    #[error("a local alias registry ('{registry}') has no dot in its hostname and is not an OCI reference")]
    NotAnOciReference { registry: String },
}

/// Artifact Fetcher failures (§4.3).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Oci(#[from] OciError),

    #[error("computed digest '{computed}' does not match expected digest '{expected}' from the lockfile")]
    Integrity { expected: String, computed: String },

    #[error("all {attempts} candidate URLs failed for git-release fetch of '{id}'")]
    FetchFallbackExhausted { id: String, attempts: usize },

    #[error("no feature metadata file found under '{path}' (expected devcontainer-feature.json or a matching entry in devcontainer-features.json)")]
    MetadataNotFound { path: String },

    #[error("failed to parse feature metadata: {message}")]
    MetadataParse { message: String },

    #[error("failed to extract archive: {message}")]
    Extraction { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Installation-Order Resolver failures (§4.4).
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("cyclic installsAfter dependency among features: {}", .ids.join(", "))]
    Cycle { ids: Vec<String> },
}

/// Lockfile Store failures.
#[derive(Error, Debug)]
pub enum LockfileError {
    #[error("failed to read lockfile at '{path}': {message}")]
    Read { path: String, message: String },

    #[error("failed to write lockfile at '{path}': {message}")]
    Write { path: String, message: String },

    #[error("malformed lockfile JSON at '{path}': {message}")]
    Malformed { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Publisher failures (§4.6).
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("missing required metadata field '{field}' in '{path}'")]
    MissingMetadata { path: String, field: String },

    #[error(transparent)]
    Oci(#[from] OciError),

    #[error("publish upload failed: {message}")]
    Upload { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Top-level error for the Features subsystem; the CLI crate's command
/// layer converts this into `anyhow::Error` at the edge.
#[derive(Error, Debug)]
pub enum CrucibleError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Oci(#[from] OciError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Lockfile(#[from] LockfileError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("configuration file not found: {path}")]
    ConfigurationNotFound { path: String },

    #[error("failed to parse configuration file: {message}")]
    ConfigurationParse { message: String },

    #[error("configuration validation error: {message}")]
    ConfigurationValidation { message: String },

    #[error("feature not implemented: {feature}")]
    NotImplemented { feature: String },

    #[error("docker runtime error: {message}")]
    Docker { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results with `CrucibleError`.
pub type Result<T> = std::result::Result<T, CrucibleError>;
