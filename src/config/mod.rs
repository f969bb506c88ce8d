// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for toolgraph.
//!
//! Handles loading and merging of configuration from multiple sources:
//! - Global config: ~/.toolgraph/config.yaml (or .json)
//! - Workspace config: .toolgraph.yaml, .toolgraph.yml or .toolgraph.json
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    find_workspace_root, get_example_config, get_global_config_dir, get_global_config_path,
    init_config, load_config_file, load_global_config, load_workspace_config,
    save_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILES,
};

pub use merger::{anchor_paths, default_config, merge_config, CliOptions};

pub use types::{ResolvedConfig, WorkspaceConfig};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources for a workspace.
///
/// Relative `project_root` and `manifest` paths are anchored at
/// `workspace_root`.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;

    Ok(anchor_paths(
        merge_config(global, workspace, cli_options),
        workspace_root,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_no_files() {
        let temp = TempDir::new().unwrap();
        let result = load_config(temp.path(), CliOptions::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_config_with_workspace_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".toolgraph.yaml"),
            "recordInputs: false\nmanifest: tools/graph.yaml\n",
        )
        .unwrap();

        let config = load_config(temp.path(), CliOptions::default()).unwrap();
        assert!(!config.record_inputs);
        assert_eq!(config.manifest, Some(temp.path().join("tools/graph.yaml")));
    }

    #[test]
    fn test_cli_overrides_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".toolgraph.json"), r#"{"maxDepth": 5}"#).unwrap();

        let cli = CliOptions {
            max_depth: Some(7),
            ..Default::default()
        };
        let config = load_config(temp.path(), cli).unwrap();
        assert_eq!(config.max_depth, 7);
    }
}
