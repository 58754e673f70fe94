//! `{{name}}` template references shared by the compiler and the validator.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Markers that identify function/operator expressions, which are exempt from
/// scope resolution.
const EXPRESSION_MARKERS: &[&str] = &["(", "||", "&&", "CONCAT", "IF("];

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("reference pattern compiles"))
}

/// A single `{{...}}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateReference {
    /// Trimmed text between the braces.
    pub raw: String,
}

impl TemplateReference {
    /// Leading identifier: `group.key` -> `group`, `rows[0]` -> `rows`.
    pub fn root(&self) -> &str {
        reference_root(&self.raw)
    }

    /// True for function calls and operator expressions.
    pub fn is_expression(&self) -> bool {
        is_expression(&self.raw)
    }
}

pub fn reference_root(raw: &str) -> &str {
    let end = raw
        .find(|c: char| c == '.' || c == '[' || c.is_whitespace())
        .unwrap_or(raw.len());
    &raw[..end]
}

pub fn is_expression(raw: &str) -> bool {
    EXPRESSION_MARKERS.iter().any(|marker| raw.contains(marker))
        || raw.split_whitespace().any(|word| word == "IS")
}

/// All references in a string, in order of appearance.
pub fn references(text: &str) -> Vec<TemplateReference> {
    reference_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| TemplateReference {
            raw: m.as_str().to_string(),
        })
        .filter(|reference| !reference.raw.is_empty())
        .collect()
}

/// Walk every string inside a JSON value and collect its references.
pub fn collect_value_references(value: &Value, out: &mut Vec<TemplateReference>) {
    match value {
        Value::String(text) => out.extend(references(text)),
        Value::Array(items) => {
            for item in items {
                collect_value_references(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_value_references(item, out);
            }
        }
        _ => {}
    }
}

/// `name` -> `{{name}}`.
pub fn wrap(name: &str) -> String {
    format!("{{{{{}}}}}", name)
}

/// `{{name}}` -> `name` when the whole (trimmed) text is a single reference.
pub fn unwrap(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}
