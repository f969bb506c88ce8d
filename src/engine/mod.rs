// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Invocation engine.
//!
//! Walks the declared dependency graph of a root tool, runs every dependency
//! before the tool that declared it, memoizes results per session, and merges
//! results according to each tool's merge policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolgraph::engine::InvocationEngine;
//!
//! let engine = InvocationEngine::new(Arc::new(registry));
//! let outcome = engine.invoke("Root", json!({"topic": "rust"})).await?;
//! println!("{}", outcome.value);
//! ```

mod session;

pub use session::Session;

use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::InvocationError;
use crate::registry::ToolRegistry;
use crate::types::{InvocationOutcome, InvocationState};

/// Default limit on dependency nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

// ============================================================================
// Configuration
// ============================================================================

/// Engine tuning.
///
/// Dependencies of one tool always run in declaration order. Independent
/// roots may still be invoked concurrently on a shared [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum dependency nesting below the root.
    pub max_depth: usize,
    /// Whether invocation records keep a copy of the public input.
    pub record_inputs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            record_inputs: true,
        }
    }
}

impl EngineConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_record_inputs(mut self, record_inputs: bool) -> Self {
        self.record_inputs = record_inputs;
        self
    }
}

// ============================================================================
// Callbacks
// ============================================================================

/// Observer for invocation progress.
pub trait InvocationCallbacks: Send + Sync {
    /// Called on every state transition of an executing invocation.
    fn on_state_change(&self, tool: &str, state: InvocationState);

    /// Called when a result is served from the session cache.
    fn on_cache_hit(&self, tool: &str);

    /// Called after an invocation's channel writes were committed.
    fn on_channel_commit(&self, tool: &str, keys: usize);
}

/// No-op implementation of callbacks.
pub struct NoOpCallbacks;

impl InvocationCallbacks for NoOpCallbacks {
    fn on_state_change(&self, _tool: &str, _state: InvocationState) {}
    fn on_cache_hit(&self, _tool: &str) {}
    fn on_channel_commit(&self, _tool: &str, _keys: usize) {}
}

// ============================================================================
// Engine
// ============================================================================

/// Entry point for hosts.
///
/// Cheap to clone; the registry is shared and read-only.
#[derive(Clone)]
pub struct InvocationEngine {
    registry: Arc<ToolRegistry>,
    config: EngineConfig,
    callbacks: Arc<dyn InvocationCallbacks>,
}

impl InvocationEngine {
    /// Create an engine over a sealed registry.
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            config: EngineConfig::default(),
            callbacks: Arc::new(NoOpCallbacks),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn InvocationCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a session the host can reuse across several invocations.
    pub fn session(&self) -> Session {
        Session::new(
            self.registry.clone(),
            self.config.clone(),
            self.callbacks.clone(),
        )
    }

    /// Invoke `root` in a fresh session.
    pub async fn invoke(
        &self,
        root: &str,
        input: Value,
    ) -> Result<InvocationOutcome, InvocationError> {
        self.session().invoke(root, input).await
    }

    /// Invoke `root` in a fresh session, stopping when `cancel` fires.
    pub async fn invoke_with_cancel(
        &self,
        root: &str,
        input: Value,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError> {
        self.session()
            .invoke_with_cancel(root, input, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{tool_fn, ToolDefinition, ToolRegistryBuilder};
    use serde_json::json;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.record_inputs);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::default()
            .with_max_depth(3)
            .with_record_inputs(false);
        assert_eq!(config.max_depth, 3);
        assert!(!config.record_inputs);
    }

    #[tokio::test]
    async fn test_each_engine_invoke_uses_fresh_session() {
        let mut builder = ToolRegistryBuilder::new();
        builder
            .register(ToolDefinition::new(
                "counter",
                tool_fn(|ctx| {
                    let seen = ctx.channel().get_or("count", json!(0)).as_i64().unwrap_or(0);
                    ctx.channel().set("count", json!(seen + 1));
                    Ok(json!(seen + 1))
                }),
            ))
            .unwrap();
        let engine = InvocationEngine::new(Arc::new(builder.build().unwrap()));

        let first = engine.invoke("counter", json!({})).await.unwrap();
        let second = engine.invoke("counter", json!({})).await.unwrap();
        assert_eq!(*first.value, json!(1));
        assert_eq!(*second.value, json!(1));
        assert_ne!(first.session_id, second.session_id);
    }
}
