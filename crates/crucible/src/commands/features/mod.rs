//! `features` subcommand dispatch: resolve, plan, package, publish.

mod package;
mod plan;
mod publish;
mod resolve;
mod shared;

use crate::cli::FeatureCommands;
use anyhow::Result;

pub async fn execute_features(command: FeatureCommands) -> Result<()> {
    match command {
        FeatureCommands::Resolve {
            feature_ref,
            config_folder,
            json,
        } => resolve::execute_features_resolve(&feature_ref, &config_folder, json).await,
        FeatureCommands::Plan {
            feature_refs,
            config_folder,
            json,
        } => plan::execute_features_plan(&feature_refs, &config_folder, json).await,
        FeatureCommands::Package { path, output, json } => {
            package::execute_features_package(&path, &output, json)
        }
        FeatureCommands::Publish {
            path,
            registry,
            namespace,
            json,
        } => publish::execute_features_publish(&path, &registry, &namespace, json).await,
    }
}
