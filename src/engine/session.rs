// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session-scoped execution: private channel, memo cache and trace.

use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[cfg(feature = "telemetry")]
use tracing::{info_span, Instrument};

use super::{EngineConfig, InvocationCallbacks};
use crate::channel::PrivateChannel;
use crate::error::InvocationError;
use crate::registry::{ToolContext, ToolDefinition, ToolRegistry};
#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;
use crate::types::{
    DependencyResult, InvocationKey, InvocationOutcome, InvocationRecord, InvocationState,
    RecordOutcome,
};

type SlotResult = Result<Arc<Value>, InvocationError>;

/// Memo entry for one (tool, input) pair.
struct Slot {
    cell: OnceCell<SlotResult>,
    state: Mutex<InvocationState>,
}

impl Slot {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            state: Mutex::new(InvocationState::Pending),
        }
    }
}

/// One top-level invocation scope, or a host-managed group of them.
///
/// Owns the private channel and the memo cache. Both are discarded when the
/// session is dropped. A session is `Send + Sync`; several roots may be
/// invoked on it concurrently and their channel commits serialize.
pub struct Session {
    id: String,
    registry: Arc<ToolRegistry>,
    config: EngineConfig,
    callbacks: Arc<dyn InvocationCallbacks>,
    channel: PrivateChannel,
    slots: Mutex<HashMap<InvocationKey, Arc<Slot>>>,
    records: Mutex<Vec<InvocationRecord>>,
    cache_hits: AtomicU64,
}

impl Session {
    pub(crate) fn new(
        registry: Arc<ToolRegistry>,
        config: EngineConfig,
        callbacks: Arc<dyn InvocationCallbacks>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            registry,
            config,
            callbacks,
            channel: PrivateChannel::new(),
            slots: Mutex::new(HashMap::new()),
            records: Mutex::new(Vec::new()),
            cache_hits: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The session's private channel.
    ///
    /// For the host's own coordination and diagnostics; its contents must not
    /// be forwarded to the output layer.
    pub fn channel(&self) -> &PrivateChannel {
        &self.channel
    }

    /// Every executed invocation so far, in completion order.
    pub fn records(&self) -> Vec<InvocationRecord> {
        self.records.lock().clone()
    }

    /// Number of tool executions so far (cache hits excluded).
    pub fn executions(&self) -> usize {
        self.records.lock().len()
    }

    /// Number of results served from the memo cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Current state of the invocation of `tool` with `input`, if it was ever requested.
    pub fn state_of(&self, tool: &str, input: &Value) -> Option<InvocationState> {
        let key = InvocationKey::new(tool, input);
        self.slots.lock().get(&key).map(|slot| *slot.state.lock())
    }

    /// Invoke `root` with `input` inside this session.
    pub async fn invoke(
        &self,
        root: &str,
        input: Value,
    ) -> Result<InvocationOutcome, InvocationError> {
        self.invoke_with_cancel(root, input, CancellationToken::new())
            .await
    }

    /// Invoke `root`, stopping pending work when `cancel` fires.
    ///
    /// Channel writes of invocations that already completed stay in place.
    pub async fn invoke_with_cancel(
        &self,
        root: &str,
        input: Value,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError> {
        if !self.registry.contains(root) {
            return Err(InvocationError::NotFound(root.to_string()));
        }

        let first_record = self.records.lock().len();
        tracing::debug!(session = %self.id, tool = %root, "Invocation started");

        let value = self
            .resolve(root.to_string(), input, 0, &cancel)
            .await
            .inspect_err(|err| {
                tracing::debug!(
                    session = %self.id,
                    tool = %root,
                    chain = ?err.chain(),
                    error = %err,
                    "Invocation failed"
                );
            })?;

        let records = self.records.lock()[first_record..].to_vec();
        Ok(InvocationOutcome {
            session_id: self.id.clone(),
            tool: root.to_string(),
            value,
            records,
        })
    }

    fn slot(&self, key: &InvocationKey) -> Arc<Slot> {
        self.slots
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }

    /// Resolve one (tool, input) pair, running it at most once per session.
    fn resolve<'s>(
        &'s self,
        name: String,
        input: Value,
        depth: usize,
        cancel: &'s CancellationToken,
    ) -> BoxFuture<'s, SlotResult> {
        Box::pin(async move {
            if depth > self.config.max_depth {
                return Err(InvocationError::DepthExceeded {
                    tool: name,
                    limit: self.config.max_depth,
                });
            }

            let key = InvocationKey::new(&name, &input);
            let slot = self.slot(&key);

            #[cfg(feature = "telemetry")]
            let execution = self
                .execute(&name, &input, cancel, depth, &slot)
                .instrument(info_span!("tool_invoke", tool = %name, session = %self.id, depth));

            #[cfg(not(feature = "telemetry"))]
            let execution = self.execute(&name, &input, cancel, depth, &slot);

            let mut initialized_here = false;
            let result = slot
                .cell
                .get_or_init(|| {
                    initialized_here = true;
                    execution
                })
                .await
                .clone();

            if !initialized_here {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(tool = %name, "Served from session cache");
                #[cfg(feature = "telemetry")]
                GLOBAL_METRICS.record_cache_hit(&name);
                self.callbacks.on_cache_hit(&name);
            }
            result
        })
    }

    async fn execute(
        &self,
        name: &str,
        input: &Value,
        cancel: &CancellationToken,
        depth: usize,
        slot: &Slot,
    ) -> SlotResult {
        let definition = self
            .registry
            .get(name)
            .ok_or_else(|| InvocationError::NotFound(name.to_string()))?;

        let _abandoned = AbandonGuard { tool: name, slot };
        let started_at = Utc::now();
        let start = Instant::now();
        self.callbacks.on_state_change(name, InvocationState::Pending);

        self.transition(name, slot, InvocationState::DependenciesRunning);
        let dependencies = match self
            .run_dependencies(&definition, input, depth, cancel)
            .await
        {
            Ok(results) => results,
            Err(err) => {
                self.transition(name, slot, InvocationState::Failed);
                self.push_record(name, input, started_at, start, Err(&err));
                return Err(err);
            }
        };

        self.transition(name, slot, InvocationState::SelfRunning);
        let scope = self.channel.scope(name);
        let computed = {
            let ctx = ToolContext::new(&self.id, input, &dependencies, &scope, cancel);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(InvocationError::Cancelled { tool: name.to_string() }),
                result = definition.tool().compute(&ctx) => result.map_err(|source| {
                    InvocationError::Computation { tool: name.to_string(), source }
                }),
            }
        };

        match computed {
            Ok(own) => {
                let merged = Arc::new(definition.merge_policy().merge(own, &dependencies));
                let keys = scope.pending_writes();
                scope.commit();
                if keys > 0 {
                    tracing::trace!(tool = %name, keys, "Channel writes committed");
                    self.callbacks.on_channel_commit(name, keys);
                }
                self.transition(name, slot, InvocationState::Succeeded);
                self.push_record(name, input, started_at, start, Ok(&merged));
                Ok(merged)
            }
            Err(err) => {
                let discarded = scope.pending_writes();
                scope.discard();
                if discarded > 0 {
                    tracing::debug!(tool = %name, discarded, "Channel writes discarded");
                }
                self.transition(name, slot, InvocationState::Failed);
                self.push_record(name, input, started_at, start, Err(&err));
                Err(err)
            }
        }
    }

    async fn run_dependencies(
        &self,
        definition: &ToolDefinition,
        input: &Value,
        depth: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<DependencyResult>, InvocationError> {
        let tool = definition.tool();
        let mut results = Vec::with_capacity(definition.dependencies().len());

        for dependency in definition.dependencies() {
            if cancel.is_cancelled() {
                return Err(InvocationError::Cancelled {
                    tool: definition.name().to_string(),
                });
            }
            let dep_input = tool.dependency_input(dependency, input);
            let outcome = self
                .resolve(dependency.clone(), dep_input, depth + 1, cancel)
                .await;
            results.push(settle(definition, dependency, outcome)?);
        }
        Ok(results)
    }

    fn transition(&self, tool: &str, slot: &Slot, next: InvocationState) {
        {
            let mut state = slot.state.lock();
            debug_assert!(
                state.can_transition_to(next),
                "illegal transition {} -> {} for {}",
                *state,
                next,
                tool
            );
            *state = next;
        }
        tracing::debug!(tool = %tool, state = %next, "Invocation state changed");
        self.callbacks.on_state_change(tool, next);
    }

    fn push_record(
        &self,
        tool: &str,
        input: &Value,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
        result: Result<&Arc<Value>, &InvocationError>,
    ) {
        let duration = start.elapsed();

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_tool(tool, duration, result.is_ok());

        let (state, outcome) = match result {
            Ok(value) => (
                InvocationState::Succeeded,
                RecordOutcome::Succeeded {
                    result: value.as_ref().clone(),
                },
            ),
            Err(err) => (
                InvocationState::Failed,
                RecordOutcome::Failed {
                    error: err.to_string(),
                    chain: err.chain(),
                },
            ),
        };

        self.records.lock().push(InvocationRecord {
            tool: tool.to_string(),
            input: self.config.record_inputs.then(|| input.clone()),
            started_at,
            finished_at: Utc::now(),
            duration,
            state,
            outcome,
        });
    }
}

/// Resets a slot whose execution future was dropped mid-flight.
///
/// The memo cell stays empty in that case, so the next request for the same
/// key runs the tool again from `Pending`.
struct AbandonGuard<'a> {
    tool: &'a str,
    slot: &'a Slot,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        if !state.is_terminal() && *state != InvocationState::Pending {
            tracing::debug!(tool = %self.tool, state = %*state, "Invocation abandoned");
            *state = InvocationState::Pending;
        }
    }
}

/// Turn a dependency outcome into a result for the parent, applying its fallback.
fn settle(
    parent: &ToolDefinition,
    dependency: &str,
    outcome: SlotResult,
) -> Result<DependencyResult, InvocationError> {
    match outcome {
        Ok(value) => Ok(DependencyResult::new(dependency, value)),
        Err(err) => {
            if !err.is_cancelled() {
                if let Some(value) = parent.tool().fallback(dependency, &err) {
                    tracing::warn!(
                        tool = %parent.name(),
                        dependency = %dependency,
                        error = %err,
                        "Dependency failed, using fallback"
                    );
                    return Ok(DependencyResult::fallback(dependency, value));
                }
            }
            Err(InvocationError::DependencyFailed {
                parent: parent.name().to_string(),
                dependency: dependency.to_string(),
                source: Box::new(err),
            })
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("executions", &self.executions())
            .field("cache_hits", &self.cache_hits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InvocationEngine;
    use crate::error::ToolError;
    use crate::merge::MergePolicy;
    use crate::registry::{tool_fn, Tool, ToolRegistryBuilder};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting(name: &'static str, counter: Arc<AtomicUsize>) -> ToolDefinition {
        ToolDefinition::new(
            name,
            tool_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!(format!("{name}-result")))
            }),
        )
    }

    #[tokio::test]
    async fn test_root_not_found() {
        let engine = InvocationEngine::new(Arc::new(ToolRegistryBuilder::new().build().unwrap()));
        let err = engine.invoke("nope", json!({})).await.unwrap_err();
        assert_eq!(err, InvocationError::NotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn test_same_input_served_from_cache() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut builder = ToolRegistryBuilder::new();
        builder.register(counting("A", count.clone())).unwrap();
        let engine = InvocationEngine::new(Arc::new(builder.build().unwrap()));
        let session = engine.session();

        let first = session.invoke("A", json!({"x": 1})).await.unwrap();
        let second = session.invoke("A", json!({"x": 1})).await.unwrap();
        assert!(Arc::ptr_eq(&first.value, &second.value));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(session.cache_hits(), 1);
        assert!(second.records.is_empty());

        let third = session.invoke("A", json!({"x": 2})).await.unwrap();
        assert!(!Arc::ptr_eq(&first.value, &third.value));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(session.executions(), 2);
    }

    #[tokio::test]
    async fn test_key_order_does_not_defeat_cache() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut builder = ToolRegistryBuilder::new();
        builder.register(counting("A", count.clone())).unwrap();
        let engine = InvocationEngine::new(Arc::new(builder.build().unwrap()));
        let session = engine.session();

        session.invoke("A", json!({"a": 1, "b": 2})).await.unwrap();
        session.invoke("A", json!({"b": 2, "a": 1})).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_reaches_terminal() {
        let mut builder = ToolRegistryBuilder::new();
        builder
            .register(ToolDefinition::new("ok", tool_fn(|_| Ok(json!(1)))))
            .unwrap();
        builder
            .register(ToolDefinition::new(
                "bad",
                tool_fn(|_| Err(ToolError::ExecutionFailed("nope".to_string()))),
            ))
            .unwrap();
        let engine = InvocationEngine::new(Arc::new(builder.build().unwrap()));
        let session = engine.session();

        session.invoke("ok", json!(null)).await.unwrap();
        let _ = session.invoke("bad", json!(null)).await;
        assert_eq!(session.state_of("ok", &json!(null)), Some(InvocationState::Succeeded));
        assert_eq!(session.state_of("bad", &json!(null)), Some(InvocationState::Failed));
        assert_eq!(session.state_of("ok", &json!(1)), None);
    }

    #[tokio::test]
    async fn test_failed_invocation_discards_channel_writes() {
        let mut builder = ToolRegistryBuilder::new();
        builder
            .register(ToolDefinition::new(
                "writer",
                tool_fn(|ctx| {
                    ctx.channel().set("partial", json!(true));
                    Err(ToolError::ExecutionFailed("after write".to_string()))
                }),
            ))
            .unwrap();
        let engine = InvocationEngine::new(Arc::new(builder.build().unwrap()));
        let session = engine.session();

        let err = session.invoke("writer", json!({})).await.unwrap_err();
        assert!(matches!(err, InvocationError::Computation { .. }));
        assert!(session.channel().get("partial").is_none());
        assert_eq!(session.records()[0].state, InvocationState::Failed);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let mut builder = ToolRegistryBuilder::new();
        builder
            .register(ToolDefinition::new("d0", tool_fn(|_| Ok(json!(0)))))
            .unwrap();
        builder
            .register(ToolDefinition::new("d1", tool_fn(|_| Ok(json!(1)))).depends_on(["d0"]))
            .unwrap();
        builder
            .register(ToolDefinition::new("d2", tool_fn(|_| Ok(json!(2)))).depends_on(["d1"]))
            .unwrap();
        let engine = InvocationEngine::new(Arc::new(builder.build().unwrap()))
            .with_config(EngineConfig::default().with_max_depth(1));

        let err = engine.invoke("d2", json!({})).await.unwrap_err();
        assert_eq!(err.chain(), vec!["d2", "d1", "d0"]);
        assert!(matches!(err.origin(), InvocationError::DepthExceeded { limit: 1, .. }));
    }

    #[tokio::test]
    async fn test_record_inputs_disabled() {
        let mut builder = ToolRegistryBuilder::new();
        builder
            .register(ToolDefinition::new("A", tool_fn(|_| Ok(json!("a")))))
            .unwrap();
        let engine = InvocationEngine::new(Arc::new(builder.build().unwrap()))
            .with_config(EngineConfig::default().with_record_inputs(false));

        let outcome = engine.invoke("A", json!({"secret": 1})).await.unwrap();
        assert!(outcome.records[0].input.is_none());
    }

    struct Rewriting;

    #[async_trait]
    impl Tool for Rewriting {
        async fn compute(&self, ctx: &ToolContext<'_>) -> Result<Value, ToolError> {
            Ok(ctx.dependency("echo").cloned().unwrap_or(Value::Null))
        }

        fn dependency_input(&self, _dependency: &str, input: &Value) -> Value {
            json!({"wrapped": input})
        }
    }

    #[tokio::test]
    async fn test_dependency_input_transform() {
        let mut builder = ToolRegistryBuilder::new();
        builder
            .register(ToolDefinition::new("echo", tool_fn(|ctx| Ok(ctx.input().clone()))))
            .unwrap();
        builder
            .register(
                ToolDefinition::new("outer", Rewriting)
                    .depends_on(["echo"])
                    .with_merge(MergePolicy::Override),
            )
            .unwrap();
        let engine = InvocationEngine::new(Arc::new(builder.build().unwrap()));

        let outcome = engine.invoke("outer", json!(7)).await.unwrap();
        assert_eq!(*outcome.value, json!({"wrapped": 7}));
    }
}
