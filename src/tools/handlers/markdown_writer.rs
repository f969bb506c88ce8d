// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Markdown writer tool.
//!
//! Writes a markdown document under an output directory. New documents (and
//! overwrites) start with a title derived from the file name and a
//! generation timestamp.

use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::error::ToolError;
use crate::registry::{Tool, ToolContext};
use crate::tools::{record_written, ToolSettings};

/// Output directory used when neither input nor defaults name one.
pub const DEFAULT_OUTPUT_DIR: &str = "generated_docs";

/// Built-in `markdown_writer` tool.
pub struct MarkdownWriterTool {
    settings: ToolSettings,
}

impl MarkdownWriterTool {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }
}

#[derive(Debug, Deserialize)]
struct MarkdownArgs {
    #[serde(default)]
    file_name: String,

    #[serde(default)]
    content: String,

    #[serde(default)]
    append: bool,

    #[serde(default = "default_output_dir")]
    output_dir: String,
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

/// `release_notes_v2` -> `Release Notes V2`
fn title_case(stem: &str) -> String {
    let mut title = String::with_capacity(stem.len());
    let mut prev_alpha = false;
    for c in stem.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                title.extend(c.to_lowercase());
            } else {
                title.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            title.push(c);
            prev_alpha = false;
        }
    }
    title
}

fn header(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".md").unwrap_or(file_name);
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        "# {}\n\n*Generated on: {timestamp}*\n\n---\n\n",
        title_case(stem)
    )
}

#[async_trait]
impl Tool for MarkdownWriterTool {
    async fn compute(&self, ctx: &ToolContext<'_>) -> Result<Value, ToolError> {
        let args: MarkdownArgs = self.settings.args(ctx.input())?;

        if args.file_name.is_empty() {
            return Err(ToolError::MissingParameter("file_name".to_string()));
        }
        if args.content.is_empty() {
            return Err(ToolError::MissingParameter("content".to_string()));
        }

        let mut file_name = args.file_name;
        if !file_name.ends_with(".md") {
            file_name.push_str(".md");
        }

        let path = self
            .settings
            .resolve_path(&format!("{}/{}", args.output_dir, file_name))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let exists = fs::try_exists(&path).await.unwrap_or(false);
        let append = args.append && exists;

        let mut text = String::new();
        if !append {
            text.push_str(&header(&file_name));
        }
        text.push_str(&args.content);
        text.push_str("\n\n");

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;

        #[cfg(feature = "telemetry")]
        debug!(path = %path.display(), append, "Markdown written");

        record_written(ctx.channel(), &path);

        Ok(Value::String(format!(
            "Successfully wrote content to {}",
            path.display()
        )))
    }
}
