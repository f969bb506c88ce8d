// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Result aggregation.
//!
//! After a tool's own computation runs, its result is combined with the
//! ordered results of its dependencies according to the tool's
//! [`MergePolicy`]. The merged value is what parents and the host see.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::DependencyResult;

/// Key under which [`MergePolicy::Collect`] stores the tool's own result.
pub const OWN_KEY: &str = "own";

/// Capability for combining a tool's own result with its dependency results.
pub trait MergeStrategy: Send + Sync {
    /// Merge `own` with `dependencies`, given in declaration order.
    fn merge(&self, own: Value, dependencies: &[DependencyResult]) -> Value;

    /// Short name used in logs and listings.
    fn name(&self) -> &str {
        "custom"
    }
}

/// How a tool's final result is assembled.
#[derive(Clone, Default)]
pub enum MergePolicy {
    /// The tool's own result wins; dependency results were only inputs.
    #[default]
    Override,
    /// `{ "own": <own>, <dependency>: <result>, ... }` in declaration order.
    Collect,
    /// Any user-supplied strategy.
    Custom(Arc<dyn MergeStrategy>),
}

impl MergePolicy {
    /// Wrap a custom strategy.
    pub fn custom<S: MergeStrategy + 'static>(strategy: S) -> Self {
        Self::Custom(Arc::new(strategy))
    }

    /// Apply the policy.
    pub fn merge(&self, own: Value, dependencies: &[DependencyResult]) -> Value {
        match self {
            Self::Override => own,
            Self::Collect => collect(own, dependencies),
            Self::Custom(strategy) => strategy.merge(own, dependencies),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Override => "override",
            Self::Collect => "collect",
            Self::Custom(strategy) => strategy.name(),
        }
    }

    pub fn is_collect(&self) -> bool {
        matches!(self, Self::Collect)
    }
}

impl fmt::Debug for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MergePolicy({})", self.name())
    }
}

fn collect(own: Value, dependencies: &[DependencyResult]) -> Value {
    let mut map = Map::with_capacity(dependencies.len() + 1);
    map.insert(OWN_KEY.to_string(), own);
    for dep in dependencies {
        map.insert(dep.name.clone(), dep.value.as_ref().clone());
    }
    Value::Object(map)
}

/// Built-in policies as they appear in manifests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeKind {
    #[default]
    Override,
    Collect,
}

impl From<MergeKind> for MergePolicy {
    fn from(kind: MergeKind) -> Self {
        match kind {
            MergeKind::Override => MergePolicy::Override,
            MergeKind::Collect => MergePolicy::Collect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deps() -> Vec<DependencyResult> {
        vec![
            DependencyResult::new("C", Arc::new(json!("c"))),
            DependencyResult::new("B", Arc::new(json!({"b": true}))),
        ]
    }

    #[test]
    fn test_override_keeps_own() {
        let merged = MergePolicy::Override.merge(json!(42), &deps());
        assert_eq!(merged, json!(42));
    }

    #[test]
    fn test_collect_preserves_declaration_order() {
        let merged = MergePolicy::Collect.merge(json!("root"), &deps());
        let keys: Vec<&String> = merged.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["own", "C", "B"]);
        assert_eq!(merged["own"], json!("root"));
        assert_eq!(merged["B"], json!({"b": true}));
    }

    #[test]
    fn test_collect_without_dependencies() {
        let merged = MergePolicy::Collect.merge(json!(1), &[]);
        assert_eq!(merged, json!({"own": 1}));
    }

    struct Concat;

    impl MergeStrategy for Concat {
        fn merge(&self, own: Value, dependencies: &[DependencyResult]) -> Value {
            let mut parts: Vec<String> = dependencies
                .iter()
                .filter_map(|d| d.value.as_str().map(str::to_string))
                .collect();
            if let Some(own) = own.as_str() {
                parts.push(own.to_string());
            }
            Value::String(parts.join("+"))
        }

        fn name(&self) -> &str {
            "concat"
        }
    }

    #[test]
    fn test_custom_strategy() {
        let policy = MergePolicy::custom(Concat);
        assert_eq!(policy.name(), "concat");
        let merged = policy.merge(json!("root"), &deps());
        assert_eq!(merged, json!("c+root"));
    }

    #[test]
    fn test_merge_kind_from_manifest() {
        let kind: MergeKind = serde_json::from_value(json!("collect")).unwrap();
        assert!(MergePolicy::from(kind).is_collect());
        assert_eq!(MergeKind::default(), MergeKind::Override);
    }
}
