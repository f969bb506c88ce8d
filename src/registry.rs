// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool registry and the tool capability.
//!
//! This module defines the core abstractions for declaring tools:
//! - [`Tool`] trait that every computation implements
//! - [`ToolDefinition`] binding a name, declared dependencies and a merge policy to a tool
//! - [`ToolRegistryBuilder`] for registering and validating definitions
//! - [`ToolRegistry`], the sealed read-only registry the engine runs against
//! - [`CallGraph`], the derived dependency closure of a root tool
//!
//! # Example
//!
//! ```rust,ignore
//! use toolgraph::registry::{tool_fn, ToolDefinition, ToolRegistryBuilder};
//!
//! let mut builder = ToolRegistryBuilder::new();
//! builder.register(ToolDefinition::new("A", tool_fn(|_| Ok(json!("a")))))?;
//! builder.register(ToolDefinition::new("B", tool_fn(|_| Ok(json!("b")))).depends_on(["A"]))?;
//! let registry = builder.build()?;
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::channel::ChannelScope;
use crate::error::{InvocationError, RegistryError, ToolError};
use crate::merge::{MergePolicy, OWN_KEY};
use crate::types::DependencyResult;

// ============================================================================
// Tool Capability
// ============================================================================

/// Everything a tool's computation can see.
pub struct ToolContext<'a> {
    pub(crate) session_id: &'a str,
    pub(crate) input: &'a Value,
    pub(crate) dependencies: &'a [DependencyResult],
    pub(crate) channel: &'a ChannelScope<'a>,
    pub(crate) cancel: &'a CancellationToken,
}

impl<'a> ToolContext<'a> {
    /// Build a context by hand, e.g. to call a tool outside the engine.
    pub fn new(
        session_id: &'a str,
        input: &'a Value,
        dependencies: &'a [DependencyResult],
        channel: &'a ChannelScope<'a>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            session_id,
            input,
            dependencies,
            channel,
            cancel,
        }
    }

    /// Public input for this invocation.
    pub fn input(&self) -> &Value {
        self.input
    }

    /// Deserialize the public input into a typed struct.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(self.input.clone())
            .map_err(|err| ToolError::InvalidInput(format!("Failed to parse arguments: {err}")))
    }

    /// Results of declared dependencies, in declaration order.
    pub fn dependencies(&self) -> &[DependencyResult] {
        self.dependencies
    }

    /// Result of one dependency by name.
    pub fn dependency(&self, name: &str) -> Option<&Value> {
        self.dependencies
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_ref())
    }

    /// Private channel view for this invocation.
    pub fn channel(&self) -> &ChannelScope<'a> {
        self.channel
    }

    /// Identifier of the owning session.
    pub fn session_id(&self) -> &str {
        self.session_id
    }

    /// Cancellation token of the root invocation.
    pub fn cancellation(&self) -> &CancellationToken {
        self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Capability every tool implements.
///
/// The engine runs a tool's declared dependencies first, then calls
/// [`compute`](Tool::compute) with their results, the public input and the
/// private channel scope.
///
/// # Example
///
/// ```rust,ignore
/// struct Greeter;
///
/// #[async_trait]
/// impl Tool for Greeter {
///     async fn compute(&self, ctx: &ToolContext<'_>) -> Result<Value, ToolError> {
///         let name = ctx.input()["name"].as_str().unwrap_or("world");
///         ctx.channel().set("greeter.last", json!(name));
///         Ok(json!(format!("hello {name}")))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Run the tool's own logic after all dependencies have completed.
    async fn compute(&self, ctx: &ToolContext<'_>) -> Result<Value, ToolError>;

    /// Public input to pass to `dependency`. Defaults to the tool's own input.
    fn dependency_input(&self, _dependency: &str, input: &Value) -> Value {
        input.clone()
    }

    /// Substitute result for a failed dependency.
    ///
    /// Returning `None` (the default) lets the failure propagate.
    fn fallback(&self, _dependency: &str, _error: &InvocationError) -> Option<Value> {
        None
    }
}

type ComputeFn = dyn Fn(&ToolContext<'_>) -> Result<Value, ToolError> + Send + Sync;

/// Tool backed by a synchronous closure.
pub struct FnTool {
    func: Box<ComputeFn>,
}

#[async_trait]
impl Tool for FnTool {
    async fn compute(&self, ctx: &ToolContext<'_>) -> Result<Value, ToolError> {
        (self.func)(ctx)
    }
}

/// Wrap a closure as a [`Tool`].
pub fn tool_fn<F>(func: F) -> FnTool
where
    F: Fn(&ToolContext<'_>) -> Result<Value, ToolError> + Send + Sync + 'static,
{
    FnTool {
        func: Box::new(func),
    }
}

// ============================================================================
// Tool Definition
// ============================================================================

/// A named tool with its declared dependencies and merge policy.
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    dependencies: Vec<String>,
    merge: MergePolicy,
    tool: Arc<dyn Tool>,
}

impl ToolDefinition {
    /// Create a definition with no dependencies and the override policy.
    pub fn new<T: Tool + 'static>(name: impl Into<String>, tool: T) -> Self {
        Self::from_arc(name, Arc::new(tool))
    }

    /// Create a definition from a shared tool handle.
    pub fn from_arc(name: impl Into<String>, tool: Arc<dyn Tool>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            dependencies: Vec::new(),
            merge: MergePolicy::Override,
            tool,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare dependencies, in the order they must run.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_merge(mut self, merge: MergePolicy) -> Self {
        self.merge = merge;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn merge_policy(&self) -> &MergePolicy {
        &self.merge
    }

    pub fn tool(&self) -> &Arc<dyn Tool> {
        &self.tool
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("merge", &self.merge)
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects tool definitions and validates the dependency graph.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    order: Vec<String>,
    tools: HashMap<String, Arc<ToolDefinition>>,
}

impl ToolRegistryBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition whose dependencies are already registered.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<&mut Self, RegistryError> {
        self.check_duplicate(&definition)?;
        if let Some(missing) = definition
            .dependencies
            .iter()
            .find(|dep| !self.tools.contains_key(dep.as_str()))
        {
            return Err(RegistryError::UnknownDependency {
                tool: definition.name.clone(),
                dependency: missing.clone(),
            });
        }
        check_reserved(&definition)?;
        self.insert(definition);
        Ok(self)
    }

    /// Register a definition whose dependencies are resolved later by [`validate`](Self::validate).
    pub fn register_deferred(
        &mut self,
        definition: ToolDefinition,
    ) -> Result<&mut Self, RegistryError> {
        self.check_duplicate(&definition)?;
        self.insert(definition);
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Check that every dependency exists and the graph has no cycle.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for name in &self.order {
            let def = &self.tools[name];
            for dep in &def.dependencies {
                if !self.tools.contains_key(dep) {
                    return Err(RegistryError::UnknownDependency {
                        tool: name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            check_reserved(def)?;
        }

        if let Some(cycle) = find_cycle(&self.order, &self.tools) {
            return Err(RegistryError::CyclicDependency { cycle });
        }
        Ok(())
    }

    /// Validate and seal the registry.
    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        self.validate()?;
        tracing::debug!(tools = self.order.len(), "Tool registry sealed");
        Ok(ToolRegistry {
            order: self.order,
            tools: self.tools,
        })
    }

    fn check_duplicate(&self, definition: &ToolDefinition) -> Result<(), RegistryError> {
        if self.tools.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateName(definition.name.clone()));
        }
        Ok(())
    }

    fn insert(&mut self, definition: ToolDefinition) {
        self.order.push(definition.name.clone());
        self.tools
            .insert(definition.name.clone(), Arc::new(definition));
    }
}

fn check_reserved(definition: &ToolDefinition) -> Result<(), RegistryError> {
    if definition.merge.is_collect() && definition.dependencies.iter().any(|d| d == OWN_KEY) {
        return Err(RegistryError::ReservedDependencyName {
            tool: definition.name.clone(),
            dependency: OWN_KEY.to_string(),
        });
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first search for a cycle, in registration then declaration order.
///
/// Returns the cycle starting at the first tool re-entered, e.g. `[A, B]`
/// for `A -> B -> A`.
fn find_cycle(
    order: &[String],
    tools: &HashMap<String, Arc<ToolDefinition>>,
) -> Option<Vec<String>> {
    fn visit<'a>(
        name: &'a str,
        tools: &'a HashMap<String, Arc<ToolDefinition>>,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(name) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                return Some(path[start..].iter().map(|n| n.to_string()).collect());
            }
            None => {}
        }

        marks.insert(name, Mark::Visiting);
        path.push(name);
        if let Some(def) = tools.get(name) {
            for dep in &def.dependencies {
                if let Some(cycle) = visit(dep, tools, marks, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        marks.insert(name, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    let mut path = Vec::new();
    order
        .iter()
        .find_map(|name| visit(name, tools, &mut marks, &mut path))
}

// ============================================================================
// Registry
// ============================================================================

/// Sealed, read-only registry of validated tools.
///
/// Only obtainable through [`ToolRegistryBuilder::build`], so every
/// dependency exists and the graph is acyclic.
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<ToolDefinition>>,
}

impl ToolRegistry {
    /// Look up a definition by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<ToolDefinition>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// All definitions in registration order.
    pub fn definitions(&self) -> Vec<Arc<ToolDefinition>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Transitive dependency closure of `root`, bottom-up.
    pub fn call_graph(&self, root: &str) -> Result<CallGraph, RegistryError> {
        self.lookup(root)?;

        let mut order = Vec::new();
        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        self.post_order(root, &mut seen, &mut order, &mut edges);

        Ok(CallGraph {
            root: root.to_string(),
            order,
            edges,
        })
    }

    fn post_order(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        order: &mut Vec<String>,
        edges: &mut Vec<(String, String)>,
    ) {
        if !seen.insert(name.to_string()) {
            return;
        }
        if let Some(def) = self.tools.get(name) {
            for dep in &def.dependencies {
                edges.push((name.to_string(), dep.clone()));
                self.post_order(dep, seen, order, edges);
            }
        }
        order.push(name.to_string());
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

/// Dependency closure of one root tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGraph {
    root: String,
    order: Vec<String>,
    edges: Vec<(String, String)>,
}

impl CallGraph {
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Tools in a valid execution order (every tool after its dependencies).
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// `(dependent, dependency)` pairs in declaration order.
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
