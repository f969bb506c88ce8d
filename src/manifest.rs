// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Declarative tool manifests.
//!
//! A manifest lists tools backed by built-in handlers:
//!
//! ```yaml
//! tools:
//!   - name: outline
//!     handler: template
//!     with: { template: "Outline for {topic}", publish_as: outline }
//!   - name: doc
//!     handler: markdown_writer
//!     depends_on: [outline]
//!     merge: collect
//! ```
//!
//! Entries may appear in any order; dependencies are resolved and the graph
//! is checked for cycles when the registry is built.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::merge::MergeKind;
use crate::registry::{ToolDefinition, ToolRegistry, ToolRegistryBuilder};
use crate::tools::{self, ToolSettings, BUILTIN_HANDLERS};

/// Manifest file names to search for (in order).
pub const MANIFEST_FILES: &[&str] = &["toolgraph.yaml", "toolgraph.yml", "toolgraph.json"];

/// A parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub tools: Vec<ManifestTool>,
}

/// One tool entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestTool {
    pub name: String,

    /// Built-in handler name (see [`BUILTIN_HANDLERS`]).
    pub handler: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub merge: MergeKind,

    /// Static arguments, overridden field by field by the public input.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub with: Map<String, Value>,
}

impl Manifest {
    /// Parse YAML text. JSON is valid YAML, so this accepts both.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a manifest file, choosing the parser from its extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "json" => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Tool names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Turn every entry into a definition and build a validated registry.
    ///
    /// Relative paths used by file tools resolve against `project_root`.
    pub fn build_registry(&self, project_root: &Path) -> Result<ToolRegistry, ConfigError> {
        let mut builder = ToolRegistryBuilder::new();

        for entry in &self.tools {
            let settings = ToolSettings::new(project_root).with_defaults(entry.with.clone());
            let tool = tools::builtin(&entry.handler, settings).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: format!("tools.{}.handler", entry.name),
                    message: format!(
                        "unknown handler '{}' (expected one of: {})",
                        entry.handler,
                        BUILTIN_HANDLERS.join(", ")
                    ),
                }
            })?;

            let definition = ToolDefinition::from_arc(entry.name.clone(), tool)
                .with_description(entry.description.clone())
                .depends_on(entry.depends_on.iter().cloned())
                .with_merge(entry.merge.into());
            builder.register_deferred(definition)?;
        }

        Ok(builder.build()?)
    }
}

/// Find a manifest file in `dir`.
pub fn find_manifest(dir: &Path) -> Option<PathBuf> {
    MANIFEST_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Manifest written by `toolgraph init`.
pub fn example_manifest() -> Manifest {
    let args = |pairs: &[(&str, &str)]| {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect::<Map<String, Value>>()
    };

    Manifest {
        tools: vec![
            ManifestTool {
                name: "outline".to_string(),
                handler: "template".to_string(),
                description: "Render an outline and share it on the private channel".to_string(),
                depends_on: Vec::new(),
                merge: MergeKind::Override,
                with: args(&[("template", "Outline for {topic}"), ("publish_as", "outline")]),
            },
            ManifestTool {
                name: "summary".to_string(),
                handler: "template".to_string(),
                description: "Summarize the topic using the outline".to_string(),
                depends_on: vec!["outline".to_string()],
                merge: MergeKind::Override,
                with: args(&[("template", "{outline}: {topic} in brief")]),
            },
            ManifestTool {
                name: "doc".to_string(),
                handler: "markdown_writer".to_string(),
                description: "Write the document and collect every result".to_string(),
                depends_on: vec!["outline".to_string(), "summary".to_string()],
                merge: MergeKind::Collect,
                with: args(&[("file_name", "notes")]),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use tempfile::TempDir;

    const YAML: &str = r#"
tools:
  - name: doc
    handler: markdown_writer
    depends_on: [outline]
    merge: collect
  - name: outline
    handler: template
    description: Outline
    with:
      template: "Outline for {topic}"
"#;

    #[test]
    fn test_parse_yaml() {
        let manifest = Manifest::from_yaml(YAML).unwrap();
        assert_eq!(manifest.names(), vec!["doc", "outline"]);
        assert_eq!(manifest.tools[0].merge, MergeKind::Collect);
        assert_eq!(manifest.tools[1].with["template"], "Outline for {topic}");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Manifest::from_yaml("tools:\n  - name: a\n    handler: template\n    retries: 3\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::YamlError(_)));
    }

    #[test]
    fn test_build_registry_out_of_order() {
        let manifest = Manifest::from_yaml(YAML).unwrap();
        let registry = manifest.build_registry(Path::new("/project")).unwrap();
        assert_eq!(registry.len(), 2);
        let doc = registry.lookup("doc").unwrap();
        assert_eq!(doc.dependencies(), ["outline".to_string()]);
        assert!(doc.merge_policy().is_collect());
    }

    #[test]
    fn test_unknown_handler() {
        let manifest = Manifest::from_yaml("tools:\n  - name: a\n    handler: bash\n").unwrap();
        let err = manifest.build_registry(Path::new("/project")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "tools.a.handler"));
    }

    #[test]
    fn test_manifest_cycle() {
        let manifest = Manifest::from_json(
            r#"{"tools": [
                {"name": "A", "handler": "template", "depends_on": ["B"]},
                {"name": "B", "handler": "template", "depends_on": ["A"]}
            ]}"#,
        )
        .unwrap();
        let err = manifest.build_registry(Path::new("/project")).unwrap_err();
        match err {
            ConfigError::Registry(RegistryError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_find_and_load() {
        let temp = TempDir::new().unwrap();
        assert!(find_manifest(temp.path()).is_none());

        let path = temp.path().join("toolgraph.json");
        std::fs::write(&path, serde_json::to_string(&example_manifest()).unwrap()).unwrap();

        let found = find_manifest(temp.path()).unwrap();
        assert_eq!(found, path);
        assert_eq!(Manifest::load(&found).unwrap(), example_manifest());
    }

    #[test]
    fn test_example_manifest_builds() {
        let registry = example_manifest()
            .build_registry(Path::new("/project"))
            .unwrap();
        let graph = registry.call_graph("doc").unwrap();
        assert_eq!(graph.order(), ["outline", "summary", "doc"]);
    }
}
