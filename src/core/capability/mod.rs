//! Capability resolution: map an abstract need ("send an email") to a concrete
//! `(plugin, action)` pair from the registry snapshot.
//!
//! Resolution inside a plugin runs four passes in fixed precedence:
//! preferred action, exact name, semantic alias, substring fallback. Author
//! markers in action documentation outrank literal naming, which outranks the
//! keyword heuristics.

pub mod category;
pub mod matcher;
pub mod semantics;

pub use category::{category_of, infer_category, PluginCategory};
pub use matcher::ActionMatcher;

use crate::core::error::AppError;
use crate::core::registry::{PluginDefinition, PluginRegistry};
use crate::core::types::ErrorCategory;
use serde::Serialize;

/// Abstract capability request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityRequest {
    /// Any plugin of `category` that provides `operation`, optionally narrowed by keywords.
    Category {
        category: PluginCategory,
        operation: String,
        keywords: Vec<String>,
    },
    /// The best action within a known plugin for a semantic operation type.
    PluginAction { plugin: String, operation: String },
}

impl CapabilityRequest {
    pub fn category(category: PluginCategory, operation: impl Into<String>) -> Self {
        CapabilityRequest::Category {
            category,
            operation: operation.into(),
            keywords: Vec::new(),
        }
    }

    pub fn category_with_keywords<I, S>(
        category: PluginCategory,
        operation: impl Into<String>,
        keywords: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CapabilityRequest::Category {
            category,
            operation: operation.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    pub fn plugin_action(plugin: impl Into<String>, operation: impl Into<String>) -> Self {
        CapabilityRequest::PluginAction {
            plugin: plugin.into(),
            operation: operation.into(),
        }
    }
}

/// Which pass selected the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPass {
    Preferred,
    ExactName,
    SemanticAlias,
    Fallback,
}

/// Concrete plugin/action pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCapability {
    pub plugin_name: String,
    pub operation: String,
    pub pass: ResolutionPass,
}

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("plugin '{plugin}' is not registered (registered plugins: {available})")]
    UnknownPlugin { plugin: String, available: String },
    #[error("plugin '{plugin}' has no action matching operation '{operation}' (actions: {actions})")]
    NoMatchingAction {
        plugin: String,
        operation: String,
        actions: String,
    },
    #[error(
        "no {category} plugin provides a '{operation}' action{narrowing} (registered plugins: {available})"
    )]
    NoMatchingPlugin {
        category: PluginCategory,
        operation: String,
        narrowing: String,
        available: String,
    },
}

impl From<CapabilityError> for AppError {
    fn from(err: CapabilityError) -> Self {
        let code = match &err {
            CapabilityError::NoMatchingPlugin { .. } => "IFC-CAP-001",
            CapabilityError::NoMatchingAction { .. } => "IFC-CAP-002",
            CapabilityError::UnknownPlugin { .. } => "IFC-CAP-003",
        };
        AppError::new(ErrorCategory::CapabilityError, err.to_string())
            .with_code(code)
            .with_suggestion("register a plugin that provides the capability or adjust the IR")
    }
}

/// Resolves capability requests against an immutable registry snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityResolver<'a> {
    registry: &'a PluginRegistry,
}

impl<'a> CapabilityResolver<'a> {
    pub fn new(registry: &'a PluginRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a PluginRegistry {
        self.registry
    }

    pub fn resolve(&self, request: &CapabilityRequest) -> Result<ResolvedCapability, CapabilityError> {
        let resolved = match request {
            CapabilityRequest::PluginAction { plugin, operation } => {
                self.resolve_in_plugin(plugin, operation)
            }
            CapabilityRequest::Category {
                category,
                operation,
                keywords,
            } => self.resolve_by_category(*category, operation, keywords),
        }?;
        tracing::debug!(
            plugin = %resolved.plugin_name,
            action = %resolved.operation,
            pass = ?resolved.pass,
            "resolved capability"
        );
        Ok(resolved)
    }

    /// Best action within `plugin` for the semantic `operation`.
    pub fn resolve_in_plugin(
        &self,
        plugin: &str,
        operation: &str,
    ) -> Result<ResolvedCapability, CapabilityError> {
        let definition = self
            .registry
            .get(plugin)
            .ok_or_else(|| CapabilityError::UnknownPlugin {
                plugin: plugin.to_string(),
                available: self.available_plugins(),
            })?;
        select_action(definition, operation)
            .map(|(action, pass)| ResolvedCapability {
                plugin_name: plugin.to_string(),
                operation: action,
                pass,
            })
            .ok_or_else(|| CapabilityError::NoMatchingAction {
                plugin: plugin.to_string(),
                operation: operation.to_string(),
                actions: definition.action_names().collect::<Vec<_>>().join(", "),
            })
    }

    fn resolve_by_category(
        &self,
        category: PluginCategory,
        operation: &str,
        keywords: &[String],
    ) -> Result<ResolvedCapability, CapabilityError> {
        for wanted in [category, PluginCategory::Any] {
            for (key, plugin) in self.registry.iter() {
                if category_of(plugin) != wanted || !narrowed_by(key, plugin, keywords) {
                    continue;
                }
                if let Some((action, pass)) = select_action(plugin, operation) {
                    return Ok(ResolvedCapability {
                        plugin_name: key.to_string(),
                        operation: action,
                        pass,
                    });
                }
            }
            if wanted == PluginCategory::Any {
                break;
            }
        }
        let narrowing = if keywords.is_empty() {
            String::new()
        } else {
            format!(" matching [{}]", keywords.join(", "))
        };
        Err(CapabilityError::NoMatchingPlugin {
            category,
            operation: operation.to_string(),
            narrowing,
            available: self.available_plugins(),
        })
    }

    fn available_plugins(&self) -> String {
        let keys = self.registry.keys();
        if keys.is_empty() {
            "<none>".to_string()
        } else {
            keys.join(", ")
        }
    }
}

fn narrowed_by(key: &str, plugin: &PluginDefinition, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let key = key.to_lowercase();
    let description = plugin.description.to_lowercase();
    keywords.iter().map(|kw| kw.to_lowercase()).any(|kw| {
        key.contains(&kw)
            || description.contains(&kw)
            || plugin
                .action_names()
                .any(|name| name.to_lowercase().contains(&kw))
    })
}

/// Run the four resolution passes over one plugin's actions.
pub fn select_action(plugin: &PluginDefinition, operation: &str) -> Option<(String, ResolutionPass)> {
    let keywords = semantics::operation_keywords(operation);
    let first = |matcher: &ActionMatcher| {
        plugin
            .actions
            .iter()
            .find(|(name, action)| matcher.matches(name, action))
            .map(|(name, _)| name.clone())
    };

    let mut preferred = vec![
        ActionMatcher::new()
            .name_keywords(keywords.clone())
            .preferred(semantics::PREFERRED_MARKER),
        ActionMatcher::new()
            .documentation_keywords(keywords.clone())
            .preferred(semantics::PREFERRED_MARKER),
    ];
    for equivalence in semantics::equivalences(operation) {
        preferred.push(
            ActionMatcher::new()
                .name_keywords([equivalence.action_keyword])
                .documentation_keywords(equivalence.documentation_keywords.iter().copied())
                .preferred(semantics::PREFERRED_MARKER),
        );
    }
    if let Some(name) = preferred.iter().find_map(first) {
        return Some((name, ResolutionPass::Preferred));
    }

    let exact = ActionMatcher::new()
        .exact(operation)
        .excluding(semantics::DISCOURAGED_PHRASES.iter().copied());
    if let Some(name) = first(&exact) {
        return Some((name, ResolutionPass::ExactName));
    }

    let qualifiers = semantics::specific_qualifiers(operation);
    let mut aliases: Vec<ActionMatcher> = qualifiers
        .iter()
        .map(|qualifier| {
            ActionMatcher::new()
                .name_keywords(keywords.clone())
                .qualifiers([*qualifier])
                .excluding(semantics::DISCOURAGED_PHRASES.iter().copied())
        })
        .collect();
    aliases.extend(keywords.iter().map(|keyword| {
        ActionMatcher::new()
            .name_keywords([keyword.as_str()])
            .excluding(semantics::DISCOURAGED_PHRASES.iter().copied())
    }));
    if let Some(name) = aliases.iter().find_map(first) {
        return Some((name, ResolutionPass::SemanticAlias));
    }

    let fallback = ActionMatcher::new().name_keywords(keywords).substring();
    first(&fallback).map(|name| (name, ResolutionPass::Fallback))
}
