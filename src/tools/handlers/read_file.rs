// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Read file tool.
//!
//! Reads a file inside the project root, optionally limited to an inclusive
//! 1-indexed line range.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::channel::namespaced;
use crate::error::ToolError;
use crate::registry::{Tool, ToolContext};
use crate::tools::ToolSettings;

/// Built-in `read_file` tool.
pub struct ReadFileTool {
    settings: ToolSettings,
}

impl ReadFileTool {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }
}

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    file_path: Option<String>,

    /// 1-indexed first line (default: 1).
    #[serde(default)]
    start_line: Option<LineNumber>,

    /// 1-indexed last line, inclusive (default: end of file).
    #[serde(default)]
    end_line: Option<LineNumber>,
}

/// Line number given either as a JSON number or as numeric text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LineNumber {
    Number(i64),
    Text(String),
}

impl LineNumber {
    fn parse(&self, field: &str) -> Result<i64, ToolError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(text) => text.trim().parse().map_err(|_| {
                ToolError::InvalidInput(format!("Invalid line number format for {field}: {text:?}"))
            }),
        }
    }
}

/// Selected slice of a file.
#[derive(Debug, PartialEq, Eq)]
struct LineSlice {
    content: String,
    line_count: usize,
    truncated: bool,
}

fn select_lines(text: &str, start_line: usize, end_line: Option<usize>) -> LineSlice {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let total = lines.len();
    let start_idx = (start_line - 1).min(total);

    let (end_idx, truncated) = match end_line {
        Some(end) => {
            let end_idx = end.min(total).max(start_idx);
            (end_idx, end_idx < total)
        }
        None => (total, false),
    };

    LineSlice {
        content: lines[start_idx..end_idx].concat(),
        line_count: total,
        truncated,
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    async fn compute(&self, ctx: &ToolContext<'_>) -> Result<Value, ToolError> {
        let args: ReadFileArgs = self.settings.args(ctx.input())?;

        let file_path = args
            .file_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ToolError::MissingParameter("file_path".to_string()))?;

        let start_line = match &args.start_line {
            Some(line) => line.parse("start_line")?,
            None => 1,
        };
        let end_line = args
            .end_line
            .as_ref()
            .map(|line| line.parse("end_line"))
            .transpose()?;

        if start_line < 1 {
            return Err(ToolError::InvalidInput(
                "start_line must be 1 or greater".to_string(),
            ));
        }
        if let Some(end) = end_line {
            if end < start_line {
                return Err(ToolError::InvalidInput(
                    "end_line must be greater than or equal to start_line".to_string(),
                ));
            }
        }

        let path = self.settings.resolve_path(&file_path)?;
        let bytes = tokio::fs::read(&path).await?;
        let text = String::from_utf8(bytes).map_err(|_| {
            ToolError::InvalidInput(format!(
                "Could not decode file as UTF-8: {}",
                path.display()
            ))
        })?;

        let slice = select_lines(&text, start_line as usize, end_line.map(|e| e as usize));

        #[cfg(feature = "telemetry")]
        debug!(path = %path.display(), lines = slice.line_count, "File read complete");

        ctx.channel().set(
            namespaced("read_file", "last_path"),
            json!(path.display().to_string()),
        );

        Ok(json!({
            "content": slice.content,
            "line_count": slice.line_count,
            "truncated": slice.truncated,
        }))
    }
}
