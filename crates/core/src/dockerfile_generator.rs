//! Image-Layer Synthesizer (§4.5): emits the Dockerfile fragment that
//! copies each Feature's files into the target image, runs its install
//! script, and exports its declared environment — plus the wrapper
//! script bodies and the merged configuration the caller threads back
//! into the top-level container configuration.

use crate::build::BuildOptions;
use crate::errors::CrucibleError;
use crate::features::{Feature, InstallationPlan, OptionValue};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, instrument};

/// Build context name for the feature content source, shared between the
/// Dockerfile and the `buildx build --build-context` invocation.
const FEATURE_CONTENT_SOURCE: &str = "dev_containers_feature_content_source";

/// Path, inside the build image, of the file holding the resolved
/// container/remote user home directories (§4.5 point 1).
const BUILTIN_ENV_PATH: &str = "/tmp/dev-container-features/devcontainer-features.builtin.env";

/// Name of the per-Feature wrapper script persisted alongside its files in
/// the cache directory (§6 "Persisted layouts").
pub const WRAPPER_SCRIPT_NAME: &str = "devcontainer-features-install.sh";

/// Configuration for Dockerfile generation.
#[derive(Debug, Clone)]
pub struct DockerfileConfig {
    /// Base image to extend.
    pub base_image: String,
    /// Target stage name.
    pub target_stage: String,
    /// Directory where features are downloaded on the host.
    pub features_source_dir: String,
    /// The container's default user, used to resolve `_CONTAINER_USER_HOME`.
    pub container_user: String,
    /// The user lifecycle commands run as, used to resolve `_REMOTE_USER_HOME`.
    pub remote_user: String,
    /// When true, use BuildKit bind-mount "frontend" semantics (copy, run,
    /// remove in one step) instead of a classic `COPY` layer.
    pub frontend_mode: bool,
}

impl Default for DockerfileConfig {
    fn default() -> Self {
        Self {
            base_image: String::new(),
            target_stage: "dev_containers_target_stage".to_string(),
            features_source_dir: String::new(),
            container_user: "root".to_string(),
            remote_user: "root".to_string(),
            frontend_mode: false,
        }
    }
}

/// The union of Features' container-level settings, built in installation
/// order and merged with the top-level configuration by the caller (§4.5
/// "Merged configuration").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedConfiguration {
    /// `(key, value)` pairs in contribution order; later entries from
    /// later-installed Features are appended, not deduplicated — callers
    /// apply them in order so a later Feature's value wins.
    pub container_env: Vec<(String, String)>,
    pub mounts: Vec<String>,
    pub cap_add: Vec<String>,
    pub security_opt: Vec<String>,
    pub init: bool,
    pub privileged: bool,
    pub entrypoint: Option<String>,
}

/// Union every Feature's contribution, in installation order, into one
/// `MergedConfiguration`.
pub fn merge_configuration(plan: &InstallationPlan) -> MergedConfiguration {
    let mut merged = MergedConfiguration::default();
    for resolved in &plan.ordered {
        let feature = &resolved.feature;
        for (key, value) in &feature.container_env {
            merged.container_env.push((key.clone(), value.clone()));
        }
        for mount in &feature.mounts {
            if !merged.mounts.contains(mount) {
                merged.mounts.push(mount.clone());
            }
        }
        for cap in &feature.cap_add {
            if !merged.cap_add.contains(cap) {
                merged.cap_add.push(cap.clone());
            }
        }
        for opt in &feature.security_opt {
            if !merged.security_opt.contains(opt) {
                merged.security_opt.push(opt.clone());
            }
        }
        merged.init = merged.init || feature.init.unwrap_or(false);
        merged.privileged = merged.privileged || feature.privileged.unwrap_or(false);
        if let Some(entrypoint) = &feature.entrypoint {
            merged.entrypoint = Some(entrypoint.clone());
        }
    }
    merged
}

/// The synthesizer's output: the Dockerfile text fragment plus the wrapper
/// script body for each v2 Feature, keyed by Feature id. The caller writes
/// each wrapper script into that Feature's cache directory before invoking
/// the build.
#[derive(Debug, Clone)]
pub struct SynthesizedBuild {
    pub dockerfile: String,
    pub wrapper_scripts: HashMap<String, String>,
}

/// Generates a Dockerfile fragment (and wrapper scripts) for installing a
/// resolved set of Features.
#[derive(Debug)]
pub struct DockerfileGenerator {
    config: DockerfileConfig,
}

impl DockerfileGenerator {
    pub fn new(config: DockerfileConfig) -> Self {
        Self { config }
    }

    /// Generate the full Dockerfile fragment for `plan`'s installation
    /// order (§4.5).
    #[instrument(skip(self, plan))]
    pub fn generate(&self, plan: &InstallationPlan) -> Result<SynthesizedBuild, CrucibleError> {
        debug!(features = plan.ordered.len(), "synthesizing image layer");

        let mut dockerfile = String::new();
        let mut wrapper_scripts = HashMap::new();

        dockerfile.push_str(&format!(
            "ARG _DEV_CONTAINERS_BASE_IMAGE={}\n\n",
            self.config.base_image
        ));
        dockerfile.push_str(&format!(
            "FROM ${{_DEV_CONTAINERS_BASE_IMAGE}} AS {}\n\n",
            self.config.target_stage
        ));
        dockerfile.push_str(&self.builtin_env_instruction());
        dockerfile.push('\n');

        for resolved in &plan.ordered {
            let feature = &resolved.feature;
            let dir_name = format!(
                "{}_{}",
                sanitize_feature_id(&feature.id),
                resolved.consecutive_id
            );

            if resolved.feature_set.internal_version == "2" {
                for (key, value) in &feature.container_env {
                    dockerfile.push_str(&format!("ENV {}\n", format_env_var(key, value)));
                }
                wrapper_scripts.insert(feature.id.clone(), wrapper_script(feature));
                dockerfile.push_str(&self.v2_block(&dir_name));
            } else {
                dockerfile.push_str(&self.v1_block(&dir_name));
            }
            dockerfile.push('\n');
        }

        Ok(SynthesizedBuild {
            dockerfile,
            wrapper_scripts,
        })
    }

    /// The one instruction resolving both users' home directories via the
    /// image's passwd database at build time.
    fn builtin_env_instruction(&self) -> String {
        format!(
            "RUN mkdir -p $(dirname {path}) \\\n    && echo \"_CONTAINER_USER_HOME=$(getent passwd {cu} | cut -d: -f6)\" > {path} \\\n    && echo \"_REMOTE_USER_HOME=$(getent passwd {ru} | cut -d: -f6)\" >> {path}\n",
            path = BUILTIN_ENV_PATH,
            cu = shell_quote(&self.config.container_user),
            ru = shell_quote(&self.config.remote_user),
        )
    }

    fn target_dir(&self, dir_name: &str) -> String {
        format!("/tmp/build-features/{}", dir_name)
    }

    /// Copy-then-`install.sh` block for a v1 FeatureSet.
    fn v1_block(&self, dir_name: &str) -> String {
        let target = self.target_dir(dir_name);
        self.copy_and_run(dir_name, &target, "chmod +x install.sh && ./install.sh")
    }

    /// Copy-then-wrapper-script block for a v2 Feature.
    fn v2_block(&self, dir_name: &str) -> String {
        let target = self.target_dir(dir_name);
        self.copy_and_run(
            dir_name,
            &target,
            &format!("chmod +x {wrapper} && ./{wrapper}", wrapper = WRAPPER_SCRIPT_NAME),
        )
    }

    /// Emit either a classic `COPY` layer followed by a `RUN`, or — in
    /// frontend mode — a single `RUN --mount=type=bind` that copies, runs,
    /// and drops the Feature directory without a persistent layer.
    fn copy_and_run(&self, dir_name: &str, target: &str, command: &str) -> String {
        if self.config.frontend_mode {
            format!(
                "RUN --mount=type=bind,from={src},source={dir},target={target},rw \\\n    cd {target} && {command}\n",
                src = FEATURE_CONTENT_SOURCE,
                dir = dir_name,
                target = target,
                command = command,
            )
        } else {
            format!(
                "COPY --from={src} {dir} {target}\nRUN cd {target} && {command}\n",
                src = FEATURE_CONTENT_SOURCE,
                dir = dir_name,
                target = target,
                command = command,
            )
        }
    }

    /// Generate build context arguments for `docker buildx build`.
    ///
    /// When `build_options` is provided and not default, cache arguments are
    /// included in the generated command.
    pub fn generate_build_args(
        &self,
        dockerfile_path: &Path,
        image_tag: &str,
        build_options: Option<&BuildOptions>,
    ) -> Vec<String> {
        let mut args = vec![
            "buildx".to_string(),
            "build".to_string(),
            "--load".to_string(),
        ];

        if let Some(opts) = build_options {
            if !opts.is_default() {
                args.extend(opts.to_docker_args());
            }
        }

        args.extend(vec![
            "--build-context".to_string(),
            format!(
                "{}={}",
                FEATURE_CONTENT_SOURCE, self.config.features_source_dir
            ),
            "--build-arg".to_string(),
            format!("_DEV_CONTAINERS_BASE_IMAGE={}", self.config.base_image),
            "--target".to_string(),
            self.config.target_stage.clone(),
            "-f".to_string(),
            dockerfile_path.display().to_string(),
            "-t".to_string(),
            image_tag.to_string(),
            ".".to_string(),
        ]);

        args
    }
}

/// Replace every character that isn't filesystem/shell-safe with `_`.
fn sanitize_feature_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Format a Dockerfile `ENV key=value` pair, escaping backslashes and quotes.
fn format_env_var(key: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{}=\"{}\"", key, escaped)
}

/// Single-quote `s` for safe interpolation into a shell heredoc, escaping
/// embedded single quotes as `'\''` (§9 "Shell-quoting hazards").
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn option_value_display(value: &OptionValue) -> String {
    match value {
        OptionValue::Boolean(b) => b.to_string(),
        OptionValue::String(s) => s.clone(),
    }
}

/// Build the `devcontainer-features-install.sh` body for a v2 Feature:
/// banner, sourced env files, `install.sh`, and a consolidated failure
/// message on non-zero exit (§4.5 point 3).
fn wrapper_script(feature: &Feature) -> String {
    let id = shell_quote(&feature.id);
    let name = shell_quote(feature.name.as_deref().unwrap_or(&feature.id));
    let description = shell_quote(feature.description.as_deref().unwrap_or(""));
    let version = shell_quote(feature.version.as_deref().unwrap_or("unknown"));

    let mut script = String::new();
    script.push_str("#!/bin/sh\nset -e\n\n");
    script.push_str(
        "echo '==========================================================================='\n",
    );
    script.push_str(&format!("echo Feature:      {}\n", name));
    script.push_str(&format!("echo Description:  {}\n", description));
    script.push_str(&format!("echo Id:           {}\n", id));
    script.push_str(&format!("echo Version:      {}\n", version));
    if let Some(doc) = &feature.documentation_url {
        script.push_str(&format!("echo Documentation: {}\n", shell_quote(doc)));
    }
    let mut options: Vec<_> = feature.value.iter().collect();
    options.sort_by(|a, b| a.0.cmp(b.0));
    for (option, value) in options {
        script.push_str(&format!(
            "echo Option {} = {}\n",
            shell_quote(option),
            shell_quote(&option_value_display(value))
        ));
    }
    script.push_str(
        "echo '==========================================================================='\n\n",
    );
    script.push_str(&format!(
        "if [ -f {path} ]; then . {path}; fi\n",
        path = BUILTIN_ENV_PATH
    ));
    script.push_str("if [ -f ./devcontainer-features.env ]; then . ./devcontainer-features.env; fi\n\n");
    script.push_str("if ! ./install.sh; then\n");
    script.push_str(&format!("    echo >&2 \"Feature {} failed to install.\"\n", name));
    if let Some(doc) = &feature.documentation_url {
        script.push_str(&format!(
            "    echo >&2 \"See {} for troubleshooting.\"\n",
            shell_quote(doc)
        ));
    }
    script.push_str("    exit 1\nfi\n");
    script
}
