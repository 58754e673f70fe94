#![allow(clippy::result_large_err)] // Compilation returns AppError for structured diagnostics.

//! Logical-IR to workflow-DSL compiler.
//!
//! The rule selector picks a strategy for the IR's shape, the chosen rule runs
//! the fragment resolvers in its own order, and the validator checks (and
//! optionally repairs) the resulting step list.

pub mod context;
pub mod normalize;
pub mod resolvers;
pub mod rules;

pub use context::{CompileContext, Pipeline};
pub use rules::{CompileEstimate, CompilerRule, RuleIssue, RuleSelector};

use crate::core::config::{CompilerSettings, IntentflowConfig, ValidatorSettings};
use crate::core::error::AppError;
use crate::core::registry::PluginRegistry;
use crate::core::types::ErrorCategory;
use crate::core::validator::{ValidationReport, WorkflowValidator};
use intentflow_types::{IntentIr, WorkflowStep};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Result of one compile call.
#[derive(Debug, Clone, Serialize)]
pub struct CompilationOutput {
    pub rule: String,
    pub steps: Vec<WorkflowStep>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rule_issues: Vec<RuleIssue>,
    pub estimate: CompileEstimate,
    /// SHA-256 of the canonical JSON of `steps`.
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

impl CompilationOutput {
    /// True unless validation ran and found blocking issues.
    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().map_or(true, |report| report.valid)
    }
}

/// How each rule judged an IR, for `explain`.
#[derive(Debug, Clone, Serialize)]
pub struct RuleCandidate {
    pub name: String,
    pub priority: u32,
    pub description: String,
    pub supports: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileExplanation {
    pub selected: Option<String>,
    pub candidates: Vec<RuleCandidate>,
    pub issues: Vec<RuleIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<CompileEstimate>,
}

pub struct Compiler<'a> {
    registry: &'a PluginRegistry,
    settings: CompilerSettings,
    validator: ValidatorSettings,
    selector: RuleSelector,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a PluginRegistry, config: &IntentflowConfig) -> Self {
        Self::with_settings(registry, config.compiler.clone(), config.validator.clone())
    }

    pub fn with_settings(
        registry: &'a PluginRegistry,
        settings: CompilerSettings,
        validator: ValidatorSettings,
    ) -> Self {
        Self {
            registry,
            settings,
            validator,
            selector: RuleSelector::new(),
        }
    }

    pub fn with_selector(mut self, selector: RuleSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn selector(&self) -> &RuleSelector {
        &self.selector
    }

    pub fn select_rule(&self, ir: &IntentIr) -> Result<&dyn CompilerRule, AppError> {
        self.selector.select(ir).ok_or_else(|| {
            AppError::new(
                ErrorCategory::UnsupportedPattern,
                "unsupported workflow pattern: no compiler rule matches the IR shape",
            )
            .with_code("IFC-RULE-001")
            .with_context("data_sources", ir.data_sources.len().to_string())
            .with_context("deliveries", ir.delivery.len().to_string())
            .with_suggestion("declare at least one data source in the IR")
        })
    }

    pub fn compile(&self, ir: &IntentIr) -> Result<CompilationOutput, AppError> {
        let rule = self.select_rule(ir)?;
        tracing::info!(rule = rule.name(), priority = rule.priority(), "selected compiler rule");

        let rule_issues = rule.validate(ir);
        for issue in &rule_issues {
            tracing::warn!(code = %issue.code, fragment = ?issue.fragment, "{}", issue.message);
        }

        let mut ctx = CompileContext::new(ir, self.registry, &self.settings);
        let mut steps = rule.compile(&mut ctx)?;
        tracing::info!(rule = rule.name(), steps = steps.len(), "compiled workflow");

        let validation = if self.settings.validate_output {
            let report = WorkflowValidator::new(Some(self.registry), self.validator.clone())
                .validate(&steps);
            steps = report.workflow.clone();
            Some(report)
        } else {
            None
        };

        Ok(CompilationOutput {
            rule: rule.name().to_string(),
            fingerprint: fingerprint(&steps)?,
            estimate: rule.estimate(ir),
            steps,
            rule_issues,
            validation,
        })
    }

    pub fn explain(&self, ir: &IntentIr) -> CompileExplanation {
        let candidates = self
            .selector
            .rules()
            .map(|rule| RuleCandidate {
                name: rule.name().to_string(),
                priority: rule.priority(),
                description: rule.description().to_string(),
                supports: rule.supports(ir),
            })
            .collect();
        let selected = self.selector.select(ir);
        CompileExplanation {
            selected: selected.map(|rule| rule.name().to_string()),
            candidates,
            issues: selected
                .map(|rule| rule.validate(ir))
                .unwrap_or_else(|| rules::helpers::common_issues(ir)),
            estimate: selected.map(|rule| rule.estimate(ir)),
        }
    }
}

/// Hex SHA-256 over the serialized step list.
pub fn fingerprint(steps: &[WorkflowStep]) -> Result<String, AppError> {
    let bytes = serde_json::to_vec(steps)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
