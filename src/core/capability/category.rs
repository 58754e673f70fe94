use crate::core::capability::matcher::tokenize;
use crate::core::registry::PluginDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse capability family of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginCategory {
    Tabular,
    Communication,
    Storage,
    Database,
    Api,
    Ai,
    Any,
}

impl PluginCategory {
    /// Parse a declared category, accepting common synonyms.
    pub fn parse(value: &str) -> PluginCategory {
        match value.trim().to_lowercase().as_str() {
            "tabular" | "spreadsheet" | "spreadsheets" | "sheets" => PluginCategory::Tabular,
            "communication" | "email" | "messaging" | "chat" | "notification" => {
                PluginCategory::Communication
            }
            "storage" | "file" | "files" | "documents" => PluginCategory::Storage,
            "database" | "db" | "sql" => PluginCategory::Database,
            "api" | "crm" | "productivity" | "search" => PluginCategory::Api,
            "ai" | "llm" => PluginCategory::Ai,
            _ => PluginCategory::Any,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginCategory::Tabular => "tabular",
            PluginCategory::Communication => "communication",
            PluginCategory::Storage => "storage",
            PluginCategory::Database => "database",
            PluginCategory::Api => "api",
            PluginCategory::Ai => "ai",
            PluginCategory::Any => "any",
        }
    }
}

impl fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared category, or the category inferred from the plugin's action vocabulary.
pub fn category_of(plugin: &PluginDefinition) -> PluginCategory {
    match plugin.category.as_deref() {
        Some(declared) if !declared.trim().is_empty() => PluginCategory::parse(declared),
        _ => infer_category(plugin.action_names()),
    }
}

/// Infer a category from action names.
pub fn infer_category<'a, I>(action_names: I) -> PluginCategory
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<String> = action_names.into_iter().map(str::to_lowercase).collect();
    let has_word = |words: &[&str]| {
        names
            .iter()
            .any(|name| tokenize(name).iter().any(|token| words.contains(token)))
    };

    if has_word(&["range", "sheet", "sheets", "rows", "cells"]) {
        return PluginCategory::Tabular;
    }
    if has_word(&["send", "reply", "forward"])
        && has_word(&["email", "emails", "mail", "message", "messages", "sms"])
    {
        return PluginCategory::Communication;
    }
    if has_word(&["upload", "download", "file", "files", "folder"]) {
        return PluginCategory::Storage;
    }
    if has_word(&["query", "sql", "table", "tables"]) {
        return PluginCategory::Database;
    }
    if has_word(&["generate", "summarize", "classify", "completion"]) {
        return PluginCategory::Ai;
    }
    if has_word(&["search", "list"]) {
        return PluginCategory::Api;
    }
    PluginCategory::Any
}
