// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core value types shared across the registry, engine and aggregator.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Invocation State
// ============================================================================

/// Lifecycle of a single tool invocation.
///
/// `Pending -> DependenciesRunning -> SelfRunning -> {Succeeded | Failed}`.
/// A dependency failure moves straight from `DependenciesRunning` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Pending,
    DependenciesRunning,
    SelfRunning,
    Succeeded,
    Failed,
}

impl InvocationState {
    /// Whether this state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Pending, DependenciesRunning)
                | (Pending, Failed)
                | (DependenciesRunning, SelfRunning)
                | (DependenciesRunning, Failed)
                | (SelfRunning, Succeeded)
                | (SelfRunning, Failed)
        )
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::DependenciesRunning => "dependencies_running",
            Self::SelfRunning => "self_running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Outcome of one executed invocation, as seen by the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Succeeded { result: Value },
    Failed { error: String, chain: Vec<String> },
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// One entry per executed tool call in a session.
///
/// Built from public values only; the private channel never flows in here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub state: InvocationState,
    pub outcome: RecordOutcome,
}

impl InvocationRecord {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(millis.max(0.0) / 1000.0))
    }
}

/// Public result handed back to the host for a root invocation.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationOutcome {
    pub session_id: String,
    pub tool: String,
    pub value: Arc<Value>,
    pub records: Vec<InvocationRecord>,
}

impl InvocationOutcome {
    /// Number of tool executions recorded for a given tool name.
    pub fn executions_of(&self, tool: &str) -> usize {
        self.records.iter().filter(|r| r.tool == tool).count()
    }
}

// ============================================================================
// Dependency Results
// ============================================================================

/// Final (merged) result of one dependency, as seen by its parent.
#[derive(Debug, Clone)]
pub struct DependencyResult {
    pub name: String,
    pub value: Arc<Value>,
    /// Set when the parent substituted a fallback after the dependency failed.
    pub substituted: bool,
}

impl DependencyResult {
    pub fn new(name: impl Into<String>, value: Arc<Value>) -> Self {
        Self {
            name: name.into(),
            value,
            substituted: false,
        }
    }

    pub fn fallback(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: Arc::new(value),
            substituted: true,
        }
    }
}

// ============================================================================
// Memoization Keys
// ============================================================================

/// Key under which a session memoizes one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationKey {
    pub tool: String,
    pub input: String,
}

impl InvocationKey {
    pub fn new(tool: &str, input: &Value) -> Self {
        Self {
            tool: tool.to_string(),
            input: canonical_json(input),
        }
    }
}

/// Serialize a JSON value with object keys sorted at every level.
///
/// Two inputs that differ only in key order map to the same string.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
