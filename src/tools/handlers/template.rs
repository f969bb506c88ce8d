// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Template tool.
//!
//! Renders `{name}` placeholders. A placeholder resolves from, in order: a
//! field of the public input, the result of a dependency with that name, a
//! key in the private channel. Names may be dotted, so namespaced channel
//! keys such as `{read_file.last_path}` resolve too. String values are
//! inserted as-is, anything else as compact JSON.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::error::ToolError;
use crate::registry::{Tool, ToolContext};
use crate::tools::ToolSettings;

static VAR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+(?:\.\w+)*)\}").expect("valid placeholder regex"));

/// Built-in `template` tool.
pub struct TemplateTool {
    settings: ToolSettings,
}

impl TemplateTool {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }
}

#[derive(Debug, Deserialize)]
struct TemplateArgs {
    template: Option<String>,

    /// Channel key that receives the rendered text.
    #[serde(default)]
    publish_as: Option<String>,
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lookup(ctx: &ToolContext<'_>, name: &str) -> Option<String> {
    if let Some(value) = ctx.input().get(name) {
        return Some(as_text(value));
    }
    if let Some(value) = ctx.dependency(name) {
        return Some(as_text(value));
    }
    ctx.channel().get(name).map(|v| as_text(&v))
}

/// Replace every placeholder, failing on the first one that cannot be resolved.
fn render<F>(template: &str, mut resolve: F) -> Result<String, ToolError>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;
    for cap in VAR_REGEX.captures_iter(template) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let value = resolve(name.as_str()).ok_or_else(|| {
            ToolError::InvalidInput(format!("Undefined template variable: {}", name.as_str()))
        })?;
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(&value);
        last = whole.end();
    }
    rendered.push_str(&template[last..]);
    Ok(rendered)
}

#[async_trait]
impl Tool for TemplateTool {
    async fn compute(&self, ctx: &ToolContext<'_>) -> Result<Value, ToolError> {
        let args: TemplateArgs = self.settings.args(ctx.input())?;
        let template = args
            .template
            .ok_or_else(|| ToolError::MissingParameter("template".to_string()))?;

        let rendered = render(&template, |name| lookup(ctx, name))?;

        if let Some(key) = args.publish_as.filter(|k| !k.is_empty()) {
            #[cfg(feature = "telemetry")]
            debug!(key = %key, "Publishing rendered template");
            ctx.channel().set(key, Value::String(rendered.clone()));
        }

        Ok(Value::String(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PrivateChannel;
    use crate::types::DependencyResult;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn with_template(template: &str) -> TemplateTool {
        let mut defaults = serde_json::Map::new();
        defaults.insert("template".to_string(), json!(template));
        TemplateTool::new(ToolSettings::new("/project").with_defaults(defaults))
    }

    #[test]
    fn test_render_plain_text() {
        let out = render("no placeholders", |_| None).unwrap();
        assert_eq!(out, "no placeholders");
    }

    #[test]
    fn test_render_unknown_placeholder() {
        let err = render("Hello {who}", |_| None).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(msg) if msg.contains("who")));
    }

    #[tokio::test]
    async fn test_resolution_order() {
        let tool = with_template("{topic}/{outline}/{tone}/{count}");
        let channel = PrivateChannel::new();
        channel.set("tone", json!("dry"));
        channel.set("topic", json!("from channel"));

        let scope = channel.scope("tmpl");
        let cancel = CancellationToken::new();
        let deps = vec![DependencyResult::new("outline", Arc::new(json!("intro, body")))];
        let input = json!({"topic": "rust", "count": 3});
        let ctx = ToolContext::new("test", &input, &deps, &scope, &cancel);

        let value = tool.compute(&ctx).await.unwrap();
        assert_eq!(value, json!("rust/intro, body/dry/3"));
    }

    #[test]
    fn test_render_dotted_placeholder() {
        let out = render("Last read: {read_file.last_path}", |name| {
            (name == "read_file.last_path").then(|| "/project/notes.txt".to_string())
        })
        .unwrap();
        assert_eq!(out, "Last read: /project/notes.txt");

        let out = render("{a.}{.b}", |_| None).unwrap();
        assert_eq!(out, "{a.}{.b}");
    }

    #[tokio::test]
    async fn test_namespaced_channel_key() {
        let tool = with_template("Wrote {files.written}");
        let channel = PrivateChannel::new();
        channel.set("files.written", json!(["a.md"]));

        let scope = channel.scope("tmpl");
        let cancel = CancellationToken::new();
        let deps: Vec<DependencyResult> = Vec::new();
        let input = json!({});
        let ctx = ToolContext::new("test", &input, &deps, &scope, &cancel);

        let value = tool.compute(&ctx).await.unwrap();
        assert_eq!(value, json!(r#"Wrote ["a.md"]"#));
    }

    #[tokio::test]
    async fn test_publish_as_stages_channel_write() {
        let tool = with_template("Outline for {topic}");
        let channel = PrivateChannel::new();
        let scope = channel.scope("tmpl");
        let cancel = CancellationToken::new();
        let deps: Vec<DependencyResult> = Vec::new();
        let input = json!({"topic": "caching", "publish_as": "outline"});

        {
            let ctx = ToolContext::new("test", &input, &deps, &scope, &cancel);
            tool.compute(&ctx).await.unwrap();
        }
        assert!(channel.get("outline").is_none());
        scope.commit();
        assert_eq!(channel.get("outline"), Some(json!("Outline for caching")));
    }

    #[tokio::test]
    async fn test_missing_template() {
        let tool = TemplateTool::new(ToolSettings::new("/project"));
        let channel = PrivateChannel::new();
        let scope = channel.scope("tmpl");
        let cancel = CancellationToken::new();
        let deps: Vec<DependencyResult> = Vec::new();
        let input = json!({});
        let ctx = ToolContext::new("test", &input, &deps, &scope, &cancel);

        let err = tool.compute(&ctx).await.unwrap_err();
        assert_eq!(err, ToolError::MissingParameter("template".to_string()));
    }
}
