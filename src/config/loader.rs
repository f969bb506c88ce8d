// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::WorkspaceConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[".toolgraph.yaml", ".toolgraph.yml", ".toolgraph.json"];

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".toolgraph";

/// Global config file names (in order).
pub const GLOBAL_CONFIG_FILES: &[&str] = &["config.yaml", "config.yml", "config.json"];

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Get the first existing global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    let dir = get_global_config_dir()?;
    GLOBAL_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Load global configuration from ~/.toolgraph/config.yaml (or .json).
pub fn load_global_config() -> Result<Option<WorkspaceConfig>, ConfigError> {
    match get_global_config_path() {
        Some(path) => load_config_file(&path).map(Some),
        None => Ok(None),
    }
}

/// Load workspace configuration from the workspace root.
///
/// Searches for config files in the following order:
/// 1. .toolgraph.yaml
/// 2. .toolgraph.yml
/// 3. .toolgraph.json
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let config: WorkspaceConfig = match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &WorkspaceConfig) -> Result<(), ConfigError> {
    if config.max_depth == Some(0) {
        return Err(ConfigError::InvalidValue {
            field: "maxDepth".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Save workspace configuration to a file.
pub fn save_workspace_config(
    workspace_root: &Path,
    config: &WorkspaceConfig,
    filename: Option<&str>,
) -> Result<PathBuf, ConfigError> {
    let filename = filename.unwrap_or(CONFIG_FILES[0]);
    let path = workspace_root.join(filename);

    let content = if filename.ends_with(".json") {
        serde_json::to_string_pretty(config)?
    } else {
        serde_yaml::to_string(config)?
    };
    std::fs::write(&path, content)?;

    Ok(path)
}

/// Initialize a new config file with default or provided configuration.
pub fn init_config(
    workspace_root: &Path,
    config: Option<WorkspaceConfig>,
) -> Result<PathBuf, ConfigError> {
    let config = config.unwrap_or_else(get_example_config);
    save_workspace_config(workspace_root, &config, None)
}

/// Find the workspace root by searching for config files.
///
/// Walks up the directory tree from `start` until it finds a directory
/// containing a config file or reaches the filesystem root.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        for filename in CONFIG_FILES {
            if current.join(filename).exists() {
                return Some(current);
            }
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

/// Get an example configuration.
pub fn get_example_config() -> WorkspaceConfig {
    WorkspaceConfig {
        max_depth: Some(crate::engine::DEFAULT_MAX_DEPTH),
        record_inputs: Some(true),
        manifest: Some(PathBuf::from("toolgraph.yaml")),
        ..Default::default()
    }
}
