#![allow(clippy::result_large_err)] // Rules return AppError for structured diagnostics.

//! Compiler rules: pattern matchers over the whole IR, each owning the order
//! in which the fragment resolvers run for the shape it targets.

pub mod api_loops;
pub mod general_pipeline;
pub mod grouped_delivery;
pub mod helpers;
pub mod simple_linear;

pub use api_loops::ApiLoopsRule;
pub use general_pipeline::GeneralPipelineRule;
pub use grouped_delivery::GroupedDeliveryRule;
pub use simple_linear::SimpleLinearRule;

use crate::core::compiler::context::CompileContext;
use crate::core::error::AppError;
use crate::core::validator::Severity;
use intentflow_types::{IntentIr, WorkflowStep};
use serde::Serialize;

/// Structural pre-check finding for an IR document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl RuleIssue {
    pub fn new(
        code: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        fragment: Option<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            fragment,
        }
    }
}

/// Projected size of a compilation, used for planning only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompileEstimate {
    /// Every step, nested ones included.
    pub total_steps: usize,
    pub ai_steps: usize,
    pub scatter_steps: usize,
}

/// A compilation strategy for one IR shape.
pub trait CompilerRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Higher priorities are tried first.
    fn priority(&self) -> u32;

    fn description(&self) -> &'static str;

    /// Pure predicate over the IR's shape.
    fn supports(&self, ir: &IntentIr) -> bool;

    fn compile(&self, ctx: &mut CompileContext<'_>) -> Result<Vec<WorkflowStep>, AppError>;

    fn validate(&self, ir: &IntentIr) -> Vec<RuleIssue> {
        helpers::common_issues(ir)
    }

    fn estimate(&self, ir: &IntentIr) -> CompileEstimate;
}

/// Tries rules by descending priority and picks the first that supports the IR.
pub struct RuleSelector {
    rules: Vec<Box<dyn CompilerRule>>,
}

impl RuleSelector {
    /// Selector populated with the built-in rules.
    pub fn new() -> Self {
        let rules: Vec<Box<dyn CompilerRule>> = vec![
            Box::new(GroupedDeliveryRule),
            Box::new(ApiLoopsRule),
            Box::new(SimpleLinearRule),
            Box::new(GeneralPipelineRule),
        ];
        Self::from_rules(rules)
    }

    pub fn from_rules(mut rules: Vec<Box<dyn CompilerRule>>) -> Self {
        rules.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        Self { rules }
    }

    pub fn with_rule(mut self, rule: Box<dyn CompilerRule>) -> Self {
        self.rules.push(rule);
        Self::from_rules(self.rules)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &dyn CompilerRule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    pub fn select(&self, ir: &IntentIr) -> Option<&dyn CompilerRule> {
        self.rules().find(|rule| rule.supports(ir))
    }
}

impl Default for RuleSelector {
    fn default() -> Self {
        Self::new()
    }
}
