#![allow(clippy::result_large_err)] // Registry loading returns AppError for structured diagnostics.

//! Read-only plugin registry snapshot consulted during capability resolution.
//!
//! The registry is loaded once (from JSON or YAML) and then passed by reference
//! into every compile call. Plugin and action order is preserved from the
//! source document so resolution is deterministic.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

fn default_parameters() -> Value {
    Value::Object(Map::new())
}

/// Schema and documentation for one plugin action.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ActionDefinition {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub usage_context: String,
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl ActionDefinition {
    /// Lowercased description and usage context, the text the matchers search.
    pub fn documentation(&self) -> String {
        format!("{} {}", self.description, self.usage_context).to_lowercase()
    }

    /// Names listed in the parameter schema's `required` array.
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// A plugin and the actions it exposes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PluginDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub actions: IndexMap<String, ActionDefinition>,
}

impl PluginDefinition {
    pub fn action(&self, name: &str) -> Option<&ActionDefinition> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

/// Immutable map of `plugin_key -> plugin definition`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PluginRegistry {
    plugins: IndexMap<String, PluginDefinition>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin while building a registry in code.
    pub fn with_plugin(mut self, key: impl Into<String>, plugin: PluginDefinition) -> Self {
        self.plugins.insert(key.into(), plugin);
        self
    }

    pub fn from_json_str(text: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, AppError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a registry snapshot; `.yaml`/`.yml` files are parsed as YAML, anything else as JSON.
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read plugin registry {}: {}", path.display(), err),
            )
            .with_code("IFC-IO-001")
        })?;
        let registry = if is_yaml(path) {
            Self::from_yaml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
        .map_err(|err| err.with_context("path", path.display().to_string()))?;
        tracing::debug!(
            plugins = registry.len(),
            path = %path.display(),
            "loaded plugin registry"
        );
        Ok(registry)
    }

    pub fn get(&self, key: &str) -> Option<&PluginDefinition> {
        self.plugins.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.plugins.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PluginDefinition)> {
        self.plugins.iter().map(|(key, plugin)| (key.as_str(), plugin))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
