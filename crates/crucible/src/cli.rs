use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Devcontainer Features CLI",
    long_about = "Drives the Features subsystem: resolve references, plan installation order, package a Feature folder, and publish to an OCI registry."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub async fn dispatch(self) -> Result<()> {
        match self.command {
            Command::Features(features) => crate::commands::features::execute_features(features).await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Devcontainer Feature operations
    #[command(subcommand)]
    Features(FeatureCommands),
}

#[derive(Subcommand, Debug)]
pub enum FeatureCommands {
    /// Classify and fetch a Feature reference into the cache
    Resolve {
        /// Feature reference, e.g. `ghcr.io/devcontainers/features/node:1`
        feature_ref: String,
        /// Configuration folder the reference is relative to (for local paths)
        #[arg(long, default_value = ".")]
        config_folder: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Fetch a set of Feature references and compute their installation order
    Plan {
        /// One or more Feature references
        feature_refs: Vec<String>,
        #[arg(long, default_value = ".")]
        config_folder: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Package a local Feature folder into a tar archive
    Package {
        /// Path to the Feature folder (containing devcontainer-feature.json)
        path: PathBuf,
        /// Where to write the resulting archive
        #[arg(long, short = 'o')]
        output: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Publish a local Feature folder to an OCI registry
    Publish {
        /// Path to the Feature folder (containing devcontainer-feature.json)
        path: PathBuf,
        /// Registry host, e.g. `ghcr.io`
        #[arg(long)]
        registry: String,
        /// Namespace under the registry, e.g. `my-org/features`
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        json: bool,
    },
}
