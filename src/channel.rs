// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Private channel shared by every tool invocation in a session.
//!
//! The channel is a string-keyed store of JSON values that tools use to pass
//! coordination state to each other without putting it in their public
//! results. It lives exactly as long as its [`Session`](crate::engine::Session).
//!
//! Tools never touch the store directly. Each invocation gets a
//! [`ChannelScope`] that reads committed values plus its own staged writes,
//! and the engine commits those writes in one step when the invocation
//! succeeds. A dependency's writes therefore become visible to its parent and
//! to later siblings only after it has fully completed.
//!
//! # Example
//!
//! ```rust,ignore
//! let channel = PrivateChannel::new();
//! let scope = channel.scope("outline");
//! scope.set("outline.sections", json!(["intro", "usage"]));
//! assert!(channel.get("outline.sections").is_none()); // not committed yet
//! scope.commit();
//! assert!(channel.get("outline.sections").is_some());
//! ```

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Builds a conventional namespaced key (`"tool.key"`).
///
/// Namespacing is a convention between tools, not something the channel
/// enforces.
pub fn namespaced(tool: &str, key: &str) -> String {
    format!("{tool}.{key}")
}

/// One atomic commit into the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCommit {
    /// Tool whose invocation produced the writes.
    pub tool: String,
    /// Keys written, in write order.
    pub keys: Vec<String>,
}

#[derive(Default)]
struct ChannelState {
    values: HashMap<String, Value>,
    commits: Vec<ChannelCommit>,
}

/// Session-scoped key-value store for private coordination data.
///
/// Deliberately not `Serialize`, and its `Debug` output lists no values.
#[derive(Default)]
pub struct PrivateChannel {
    state: Mutex<ChannelState>,
}

impl PrivateChannel {
    /// Create a fresh, empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a committed value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().values.get(key).cloned()
    }

    /// Read a committed value, or `default` when the key is absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Write a value directly, outside any tool invocation.
    ///
    /// Used by hosts to seed a session before the first invocation.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.commit("<host>", vec![(key.into(), value)]);
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commits in the order they were applied.
    pub fn commit_log(&self) -> Vec<ChannelCommit> {
        self.state.lock().commits.clone()
    }

    /// Tool names in commit order.
    pub fn commit_order(&self) -> Vec<String> {
        self.state
            .lock()
            .commits
            .iter()
            .map(|c| c.tool.clone())
            .collect()
    }

    /// Open a per-invocation scope for `tool`.
    pub fn scope(&self, tool: impl Into<String>) -> ChannelScope<'_> {
        ChannelScope {
            channel: self,
            tool: tool.into(),
            staged: Mutex::new(Vec::new()),
        }
    }

    fn commit(&self, tool: &str, writes: Vec<(String, Value)>) {
        if writes.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        let mut keys = Vec::with_capacity(writes.len());
        for (key, value) in writes {
            keys.push(key.clone());
            state.values.insert(key, value);
        }
        state.commits.push(ChannelCommit {
            tool: tool.to_string(),
            keys,
        });
    }
}

impl fmt::Debug for PrivateChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PrivateChannel")
            .field("keys", &state.values.len())
            .field("commits", &state.commits.len())
            .finish()
    }
}

/// View of the channel for one tool invocation.
///
/// Writes are staged until [`commit`](Self::commit); reads see committed
/// values overlaid with this scope's staged writes.
pub struct ChannelScope<'a> {
    channel: &'a PrivateChannel,
    tool: String,
    staged: Mutex<Vec<(String, Value)>>,
}

impl<'a> ChannelScope<'a> {
    /// Tool that owns this scope.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Read a value, preferring this invocation's own staged writes.
    pub fn get(&self, key: &str) -> Option<Value> {
        let staged = self
            .staged
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone());
        staged.or_else(|| self.channel.get(key))
    }

    /// Read a value, or `default` when the key is absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Stage a write. It becomes visible to other tools once this invocation succeeds.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.staged.lock().push((key.into(), value));
    }

    /// Read and deserialize a value.
    ///
    /// Returns `None` when the key is absent or holds an incompatible value.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Serialize and stage a value.
    pub fn set_as<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    /// Number of staged writes not yet committed.
    pub fn pending_writes(&self) -> usize {
        self.staged.lock().len()
    }

    /// Apply all staged writes to the channel in one step.
    pub fn commit(self) {
        let writes = std::mem::take(&mut *self.staged.lock());
        self.channel.commit(&self.tool, writes);
    }

    /// Drop all staged writes.
    pub fn discard(self) {
        self.staged.lock().clear();
    }
}

impl fmt::Debug for ChannelScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelScope")
            .field("tool", &self.tool)
            .field("pending_writes", &self.pending_writes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_channel_is_empty() {
        let channel = PrivateChannel::new();
        assert!(channel.is_empty());
        assert_eq!(channel.get_or("missing", json!(0)), json!(0));
    }

    #[test]
    fn test_staged_writes_invisible_until_commit() {
        let channel = PrivateChannel::new();
        let scope = channel.scope("A");
        scope.set("A.value", json!(1));

        assert_eq!(scope.get("A.value"), Some(json!(1)));
        assert!(channel.get("A.value").is_none());
        assert_eq!(scope.pending_writes(), 1);

        scope.commit();
        assert_eq!(channel.get("A.value"), Some(json!(1)));
        assert_eq!(channel.commit_order(), vec!["A"]);
    }

    #[test]
    fn test_discard_drops_writes() {
        let channel = PrivateChannel::new();
        let scope = channel.scope("A");
        scope.set("k", json!("v"));
        scope.discard();
        assert!(channel.get("k").is_none());
        assert!(channel.commit_log().is_empty());
    }

    #[test]
    fn test_scope_reads_latest_staged_value() {
        let channel = PrivateChannel::new();
        channel.set("k", json!("committed"));
        let scope = channel.scope("A");
        assert_eq!(scope.get("k"), Some(json!("committed")));
        scope.set("k", json!("first"));
        scope.set("k", json!("second"));
        assert_eq!(scope.get("k"), Some(json!("second")));
        scope.commit();
        assert_eq!(channel.get("k"), Some(json!("second")));
    }

    #[test]
    fn test_empty_scope_does_not_log_commit() {
        let channel = PrivateChannel::new();
        channel.scope("A").commit();
        assert!(channel.commit_log().is_empty());
    }

    #[test]
    fn test_typed_helpers() {
        let channel = PrivateChannel::new();
        let scope = channel.scope("A");
        scope.set_as("files", &vec!["a.md", "b.md"]).unwrap();
        let files: Vec<String> = scope.get_as("files").unwrap();
        assert_eq!(files, vec!["a.md", "b.md"]);
        assert!(scope.get_as::<u32>("files").is_none());
    }

    #[test]
    fn test_debug_redacts_values() {
        let channel = PrivateChannel::new();
        channel.set("secret", json!("hunter2"));
        let debug = format!("{:?}", channel);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("keys: 1"));
    }

    #[test]
    fn test_namespaced() {
        assert_eq!(namespaced("read_file", "last_path"), "read_file.last_path");
    }
}
