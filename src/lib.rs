// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! toolgraph - a tool-invocation coordinator.
//!
//! Tools are named units of computation that declare the tools they depend
//! on. The engine resolves that graph, runs each dependency before the tool
//! that declared it, memoizes results per session and merges results
//! according to each tool's policy. Tools coordinate through a session-scoped
//! private channel whose contents never appear in public results.
//!
//! # Architecture
//!
//! - [`error`] - Error types and result aliases
//! - [`types`] - Invocation states, records, outcomes and cache keys
//! - [`registry`] - Tool capability, definitions, registry builder and validation
//! - [`channel`] - Session-private key/value channel with staged writes
//! - [`merge`] - Merge policies combining a tool's result with its dependencies'
//! - [`engine`] - Invocation engine and sessions
//! - [`tools`] - Built-in file and template tools
//! - [`manifest`] - Declarative YAML/JSON manifests of built-in tools
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Tracing initialization and metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use serde_json::json;
//! use toolgraph::{tool_fn, InvocationEngine, MergePolicy, ToolDefinition, ToolRegistryBuilder};
//!
//! let mut builder = ToolRegistryBuilder::new();
//! builder.register(ToolDefinition::new("A", tool_fn(|_| Ok(json!("a")))))?;
//! builder.register(
//!     ToolDefinition::new("Root", tool_fn(|_| Ok(json!("root"))))
//!         .depends_on(["A"])
//!         .with_merge(MergePolicy::Collect),
//! )?;
//!
//! let engine = InvocationEngine::new(Arc::new(builder.build()?));
//! let outcome = engine.invoke("Root", json!({})).await?;
//! assert_eq!(*outcome.value, json!({"own": "root", "A": "a"}));
//! ```

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod registry;
pub mod telemetry;
pub mod tools;
pub mod types;

// Re-export commonly used types at crate root
pub use channel::{ChannelScope, PrivateChannel};
pub use engine::{EngineConfig, InvocationCallbacks, InvocationEngine, NoOpCallbacks, Session};
pub use error::{ConfigError, InvocationError, RegistryError, Result, ToolError};
pub use manifest::Manifest;
pub use merge::{MergePolicy, MergeStrategy};
pub use registry::{
    tool_fn, CallGraph, Tool, ToolContext, ToolDefinition, ToolRegistry, ToolRegistryBuilder,
};
pub use types::{DependencyResult, InvocationOutcome, InvocationRecord, InvocationState};

/// toolgraph version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
