// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of workspace and resolved configuration,
//! supporting JSON and YAML formats.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::{EngineConfig, DEFAULT_MAX_DEPTH};

/// Workspace configuration for toolgraph.
///
/// Can be defined in `.toolgraph.yaml` or `.toolgraph.json` in the project
/// root, or globally in `~/.toolgraph/config.yaml`. Every field is optional;
/// missing fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Maximum dependency nesting below the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Whether invocation records keep the public input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_inputs: Option<bool>,

    /// Root directory that built-in file tools are confined to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,

    /// Path of the tool manifest, relative to the workspace root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
}

/// Fully resolved configuration with all values set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub max_depth: usize,
    pub record_inputs: bool,
    /// `None` means the `TOOLGRAPH_PROJECT_ROOT` variable or the working directory.
    pub project_root: Option<PathBuf>,
    /// `None` means "search the workspace root for a manifest".
    pub manifest: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            record_inputs: true,
            project_root: None,
            manifest: None,
        }
    }
}

impl ResolvedConfig {
    /// Engine settings carried by this configuration.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_max_depth(self.max_depth)
            .with_record_inputs(self.record_inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_config_yaml() {
        let yaml = "maxDepth: 8\nmanifest: tools/toolgraph.yaml\n";
        let config: WorkspaceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_depth, Some(8));
        assert_eq!(config.manifest, Some(PathBuf::from("tools/toolgraph.yaml")));
        assert!(config.record_inputs.is_none());
    }

    #[test]
    fn test_workspace_config_json_skips_unset() {
        let config = WorkspaceConfig {
            record_inputs: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"recordInputs":false}"#);
    }

    #[test]
    fn test_invalid_max_depth_rejected() {
        let result: Result<WorkspaceConfig, _> = serde_json::from_str(r#"{"maxDepth": "deep"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolved_defaults_match_engine() {
        let resolved = ResolvedConfig::default();
        assert_eq!(resolved.to_engine_config(), EngineConfig::default());
    }
}
