// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Write file tool.
//!
//! Writes or appends content to a file inside the project root, creating
//! parent directories as needed.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use crate::error::ToolError;
use crate::registry::{Tool, ToolContext};
use crate::tools::{record_written, ToolSettings};

/// Built-in `write_file` tool.
pub struct WriteFileTool {
    settings: ToolSettings,
}

impl WriteFileTool {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }
}

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    file_path: Option<String>,

    /// Anything that is not a string is written as JSON text.
    #[serde(default)]
    content: Value,

    /// `"w"` to overwrite, `"a"` to append.
    #[serde(default = "default_mode")]
    mode: String,

    #[serde(default = "default_create_dirs")]
    create_dirs: bool,
}

fn default_mode() -> String {
    "w".to_string()
}

fn default_create_dirs() -> bool {
    true
}

fn content_text(content: Value) -> Result<String, ToolError> {
    match content {
        Value::Null => Err(ToolError::MissingParameter("content".to_string())),
        Value::String(text) => Ok(text),
        other => Ok(other.to_string()),
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    #[cfg_attr(feature = "telemetry", instrument(skip(self, ctx), fields(path, bytes)))]
    async fn compute(&self, ctx: &ToolContext<'_>) -> Result<Value, ToolError> {
        let args: WriteFileArgs = self.settings.args(ctx.input())?;

        let file_path = args
            .file_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ToolError::MissingParameter("file_path".to_string()))?;
        let content = content_text(args.content)?;

        let append = match args.mode.as_str() {
            "w" => false,
            "a" => true,
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "mode must be 'w' or 'a', got '{other}'"
                )))
            }
        };

        let path = self.settings.resolve_path(&file_path)?;

        #[cfg(feature = "telemetry")]
        {
            let span = tracing::Span::current();
            span.record("path", path.display().to_string());
            span.record("bytes", content.len());
        }

        if args.create_dirs {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    ToolError::IoError(format!("Failed to create parent directories: {e}"))
                })?;
            }
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        #[cfg(feature = "telemetry")]
        debug!(path = %path.display(), bytes = content.len(), append, "File write complete");

        record_written(ctx.channel(), &path);

        Ok(json!({
            "status": "success",
            "file_path": path.display().to_string(),
            "bytes_written": content.len(),
            "message": "File written successfully",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PrivateChannel;
    use crate::tools::FILES_WRITTEN_KEY;
    use crate::types::DependencyResult;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    async fn run(tool: &WriteFileTool, channel: &PrivateChannel, input: Value) -> Result<Value, ToolError> {
        let scope = channel.scope("write_file");
        let cancel = CancellationToken::new();
        let deps: Vec<DependencyResult> = Vec::new();
        let result = {
            let ctx = ToolContext::new("test", &input, &deps, &scope, &cancel);
            tool.compute(&ctx).await
        };
        scope.commit();
        result
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let temp = tempdir().unwrap();
        let tool = WriteFileTool::new(ToolSettings::new(temp.path()));
        let channel = PrivateChannel::new();

        let value = run(
            &tool,
            &channel,
            json!({"file_path": "out/nested/a.txt", "content": "hello"}),
        )
        .await
        .unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["bytes_written"], 5);
        let written = temp.path().join("out/nested/a.txt");
        assert_eq!(std::fs::read_to_string(&written).unwrap(), "hello");

        let recorded: Vec<String> =
            serde_json::from_value(channel.get(FILES_WRITTEN_KEY).unwrap()).unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].ends_with("a.txt"));
    }

    #[tokio::test]
    async fn test_append_mode() {
        let temp = tempdir().unwrap();
        let tool = WriteFileTool::new(ToolSettings::new(temp.path()));
        let channel = PrivateChannel::new();

        run(&tool, &channel, json!({"file_path": "log.txt", "content": "one\n"}))
            .await
            .unwrap();
        run(
            &tool,
            &channel,
            json!({"file_path": "log.txt", "content": "two\n", "mode": "a"}),
        )
        .await
        .unwrap();

        let text = std::fs::read_to_string(temp.path().join("log.txt")).unwrap();
        assert_eq!(text, "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_overwrite_mode_truncates() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "a much longer original").unwrap();
        let tool = WriteFileTool::new(ToolSettings::new(temp.path()));
        let channel = PrivateChannel::new();

        run(&tool, &channel, json!({"file_path": "a.txt", "content": "short"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(temp.path().join("a.txt")).unwrap(), "short");
    }

    #[tokio::test]
    async fn test_non_string_content_written_as_json() {
        let temp = tempdir().unwrap();
        let tool = WriteFileTool::new(ToolSettings::new(temp.path()));
        let channel = PrivateChannel::new();

        run(&tool, &channel, json!({"file_path": "data.json", "content": {"k": 1}}))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(temp.path().join("data.json")).unwrap(),
            r#"{"k":1}"#
        );
    }

    #[tokio::test]
    async fn test_rejects_bad_arguments() {
        let temp = tempdir().unwrap();
        let tool = WriteFileTool::new(ToolSettings::new(temp.path()));
        let channel = PrivateChannel::new();

        let err = run(&tool, &channel, json!({"file_path": "a.txt"})).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter(_)));

        let err = run(
            &tool,
            &channel,
            json!({"file_path": "a.txt", "content": "x", "mode": "x"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        let err = run(&tool, &channel, json!({"file_path": "../escape.txt", "content": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SecurityViolation(_)));
        assert!(channel.get(FILES_WRITTEN_KEY).is_none());
    }

    #[tokio::test]
    async fn test_defaults_fill_missing_arguments() {
        let temp = tempdir().unwrap();
        let mut defaults = serde_json::Map::new();
        defaults.insert("file_path".to_string(), json!("default.txt"));
        let tool = WriteFileTool::new(ToolSettings::new(temp.path()).with_defaults(defaults));
        let channel = PrivateChannel::new();

        run(&tool, &channel, json!({"content": "from defaults"}))
            .await
            .unwrap();
        assert!(temp.path().join("default.txt").exists());
    }
}
