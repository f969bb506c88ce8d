// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for toolgraph.
//!
//! This module provides strongly-typed errors for the different layers of the
//! coordinator, using `thiserror` for ergonomic error definitions and `anyhow`
//! for error propagation at the binary boundary.
//!
//! Structural errors ([`RegistryError`]) are raised while building the
//! registry, before any tool runs. Runtime errors ([`InvocationError`]) carry
//! the chain of tool names from the root invocation to the failure point.

use thiserror::Error;

/// Errors raised while registering, validating or looking up tools.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    DuplicateName(String),

    #[error("Tool '{tool}' depends on unknown tool '{dependency}'")]
    UnknownDependency { tool: String, dependency: String },

    #[error("Cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Tool '{tool}' uses the collect merge policy and cannot depend on a tool named '{dependency}'")]
    ReservedDependencyName { tool: String, dependency: String },
}

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}

impl RegistryError {
    /// Name of the missing dependency, if this is an unknown-dependency error.
    pub fn missing_dependency(&self) -> Option<&str> {
        match self {
            Self::UnknownDependency { dependency, .. } => Some(dependency),
            _ => None,
        }
    }

    /// Tool names forming the cycle, if this is a cyclic-dependency error.
    pub fn cycle(&self) -> Option<&[String]> {
        match self {
            Self::CyclicDependency { cycle } => Some(cycle),
            _ => None,
        }
    }
}

/// Errors that a tool's own computation can produce.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Security violation: {0}")]
    SecurityViolation(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Errors that abort an invocation at runtime.
///
/// Cloneable so that a memoized failure can be handed to every caller that
/// waited on the same (tool, input) pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Dependency '{dependency}' of '{parent}' failed: {source}")]
    DependencyFailed {
        parent: String,
        dependency: String,
        #[source]
        source: Box<InvocationError>,
    },

    #[error("Tool '{tool}' failed: {source}")]
    Computation {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("Invocation of '{tool}' was cancelled")]
    Cancelled { tool: String },

    #[error("Invocation of '{tool}' exceeded the maximum depth of {limit}")]
    DepthExceeded { tool: String, limit: usize },
}

impl InvocationError {
    /// Tool names from the outermost failing invocation down to the failure point.
    pub fn chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self;
        loop {
            match current {
                Self::DependencyFailed {
                    parent, source, ..
                } => {
                    chain.push(parent.clone());
                    current = source;
                }
                Self::NotFound(tool)
                | Self::Computation { tool, .. }
                | Self::Cancelled { tool }
                | Self::DepthExceeded { tool, .. } => {
                    chain.push(tool.clone());
                    return chain;
                }
            }
        }
    }

    /// The innermost error, past every dependency wrapper.
    pub fn origin(&self) -> &InvocationError {
        match self {
            Self::DependencyFailed { source, .. } => source.origin(),
            other => other,
        }
    }

    /// Name of the tool where the failure originated.
    pub fn failed_tool(&self) -> &str {
        match self.origin() {
            Self::NotFound(tool)
            | Self::Computation { tool, .. }
            | Self::Cancelled { tool }
            | Self::DepthExceeded { tool, .. } => tool,
            Self::DependencyFailed { dependency, .. } => dependency,
        }
    }

    /// Check if the failure was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.origin(), Self::Cancelled { .. })
    }
}

/// Errors that can occur during configuration and manifest loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
