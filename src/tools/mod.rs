// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Built-in tools.
//!
//! Ready-made [`Tool`](crate::registry::Tool) implementations that manifests
//! can reference by handler name:
//!
//! - `read_file` - read a file, optionally a line range
//! - `write_file` - write or append to a file
//! - `markdown_writer` - write a markdown document with a generated header
//! - `template` - render `{placeholder}` text from input, dependency results and the channel
//!
//! Every built-in takes a [`ToolSettings`]: the project root that relative
//! paths resolve against, plus static default arguments that the public
//! input overrides field by field.

pub mod handlers;

pub use handlers::{MarkdownWriterTool, ReadFileTool, TemplateTool, WriteFileTool};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::channel::ChannelScope;
use crate::error::ToolError;
use crate::registry::Tool;

/// Environment variable overriding the project root.
pub const PROJECT_ROOT_ENV: &str = "TOOLGRAPH_PROJECT_ROOT";

/// Channel key listing every path written by the file tools in a session.
pub const FILES_WRITTEN_KEY: &str = "files.written";

/// Handler names accepted in manifests.
pub const BUILTIN_HANDLERS: &[&str] = &["read_file", "write_file", "markdown_writer", "template"];

/// Shared settings for built-in tools.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    project_root: PathBuf,
    defaults: Map<String, Value>,
}

impl ToolSettings {
    /// Settings rooted at `project_root`, with no default arguments.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: normalize(&project_root.into()),
            defaults: Map::new(),
        }
    }

    /// Static arguments used when the public input does not provide them.
    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    /// Merge defaults with the public input and deserialize the result.
    ///
    /// Input fields win over defaults. A `null` input means "defaults only".
    pub fn args<T: DeserializeOwned>(&self, input: &Value) -> Result<T, ToolError> {
        let mut merged = self.defaults.clone();
        match input {
            Value::Object(fields) => {
                for (key, value) in fields {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Value::Null => {}
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "expected an object of arguments, got {other}"
                )))
            }
        }
        serde_json::from_value(Value::Object(merged))
            .map_err(|err| ToolError::InvalidInput(format!("Failed to parse arguments: {err}")))
    }

    /// Resolve `path` against the project root, refusing anything outside it.
    pub fn resolve_path(&self, path: &str) -> Result<PathBuf, ToolError> {
        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.project_root.join(candidate)
        };
        let resolved = normalize(&joined);
        if !resolved.starts_with(&self.project_root) {
            return Err(ToolError::SecurityViolation(format!(
                "Access to '{}' is not allowed",
                resolved.display()
            )));
        }
        Ok(resolved)
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::new(default_project_root())
    }
}

/// Project root from `TOOLGRAPH_PROJECT_ROOT`, else the working directory.
pub fn default_project_root() -> PathBuf {
    std::env::var_os(PROJECT_ROOT_ENV)
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Lexically normalize a path (no filesystem access, symlinks untouched).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Append `path` to the session's list of written files.
pub(crate) fn record_written(channel: &ChannelScope<'_>, path: &Path) {
    let mut written: Vec<String> = channel.get_as(FILES_WRITTEN_KEY).unwrap_or_default();
    written.push(path.display().to_string());
    channel.set(FILES_WRITTEN_KEY, Value::from(written));
}

/// Instantiate a built-in tool by handler name.
pub fn builtin(handler: &str, settings: ToolSettings) -> Option<Arc<dyn Tool>> {
    let tool: Arc<dyn Tool> = match handler {
        "read_file" => Arc::new(ReadFileTool::new(settings)),
        "write_file" => Arc::new(WriteFileTool::new(settings)),
        "markdown_writer" => Arc::new(MarkdownWriterTool::new(settings)),
        "template" => Arc::new(TemplateTool::new(settings)),
        _ => return None,
    };
    Some(tool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Args {
        name: String,
        #[serde(default)]
        count: u32,
    }

    fn settings() -> ToolSettings {
        let mut defaults = Map::new();
        defaults.insert("name".to_string(), json!("default"));
        defaults.insert("count".to_string(), json!(3));
        ToolSettings::new("/project").with_defaults(defaults)
    }

    #[test]
    fn test_args_input_overrides_defaults() {
        let args: Args = settings().args(&json!({"name": "given"})).unwrap();
        assert_eq!(args.name, "given");
        assert_eq!(args.count, 3);
    }

    #[test]
    fn test_args_null_input_uses_defaults() {
        let args: Args = settings().args(&Value::Null).unwrap();
        assert_eq!(args.name, "default");
    }

    #[test]
    fn test_args_rejects_non_object() {
        let err = settings().args::<Args>(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn test_resolve_relative_path() {
        let path = settings().resolve_path("docs/../src/lib.rs").unwrap();
        assert_eq!(path, PathBuf::from("/project/src/lib.rs"));
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let err = settings().resolve_path("../etc/passwd").unwrap_err();
        assert!(matches!(err, ToolError::SecurityViolation(_)));

        let err = settings().resolve_path("/etc/passwd").unwrap_err();
        assert!(matches!(err, ToolError::SecurityViolation(_)));
    }

    #[test]
    fn test_resolve_absolute_inside_root() {
        let path = settings().resolve_path("/project/a.txt").unwrap();
        assert_eq!(path, PathBuf::from("/project/a.txt"));
    }

    #[test]
    fn test_builtin_lookup() {
        for name in BUILTIN_HANDLERS {
            assert!(builtin(name, settings()).is_some(), "{name} should exist");
        }
        assert!(builtin("bash", settings()).is_none());
    }

    #[test]
    fn test_record_written_appends() {
        let channel = crate::channel::PrivateChannel::new();
        let scope = channel.scope("writer");
        record_written(&scope, Path::new("/project/a.md"));
        record_written(&scope, Path::new("/project/b.md"));
        scope.commit();
        assert_eq!(
            channel.get(FILES_WRITTEN_KEY),
            Some(json!(["/project/a.md", "/project/b.md"]))
        );
    }
}
