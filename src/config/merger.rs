// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::{Path, PathBuf};

use super::types::{ResolvedConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub max_depth: Option<usize>,
    pub record_inputs: Option<bool>,
    pub project_root: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Workspace config (.toolgraph.yaml)
/// 3. Global config (~/.toolgraph/config.yaml)
/// 4. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    if let Some(config) = global {
        apply_workspace_config(&mut result, &config);
    }

    if let Some(config) = workspace {
        apply_workspace_config(&mut result, &config);
    }

    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if let Some(max_depth) = config.max_depth {
        result.max_depth = max_depth;
    }

    if let Some(record_inputs) = config.record_inputs {
        result.record_inputs = record_inputs;
    }

    if config.project_root.is_some() {
        result.project_root = config.project_root.clone();
    }

    if config.manifest.is_some() {
        result.manifest = config.manifest.clone();
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(max_depth) = cli.max_depth {
        result.max_depth = max_depth;
    }

    if let Some(record_inputs) = cli.record_inputs {
        result.record_inputs = record_inputs;
    }

    if cli.project_root.is_some() {
        result.project_root = cli.project_root.clone();
    }

    if cli.manifest.is_some() {
        result.manifest = cli.manifest.clone();
    }
}

/// Make relative `project_root` and `manifest` paths absolute against `base`.
pub fn anchor_paths(mut config: ResolvedConfig, base: &Path) -> ResolvedConfig {
    let anchor = |path: PathBuf| {
        if path.is_absolute() {
            path
        } else {
            base.join(path)
        }
    };
    config.project_root = config.project_root.map(anchor);
    config.manifest = config.manifest.map(anchor);
    config
}
