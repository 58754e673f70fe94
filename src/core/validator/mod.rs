//! Post-compilation validator.
//!
//! A fixed battery of independent checks runs over every step of a compiled
//! workflow, nested scopes included. Issues are sorted by
//! `(severity desc, code asc, step id asc)`. When auto-fix is enabled and any
//! issue is fixable, the fixes are applied to a copy and the copy is
//! validated again; the report always describes the workflow it returns.

pub mod autofix;
pub mod checks;
pub mod scope;

pub use autofix::{apply_fixes, AppliedFix};
pub use checks::{CheckContext, WorkflowCheck};
pub use scope::{infer_iterator_variable, WorkflowScan, BUILTIN_ROOTS};

use crate::core::config::ValidatorSettings;
use crate::core::registry::PluginRegistry;
use checks::*;
use intentflow_types::WorkflowStep;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn rank(&self) -> u8 {
        match self {
            Severity::Error => 2,
            Severity::Warning => 1,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub step_id: String,
    pub severity: Severity,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub auto_fixable: bool,
}

impl ValidationIssue {
    pub fn new(
        step_id: impl Into<String>,
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            severity,
            code: code.into(),
            message: message.into(),
            suggestion,
            auto_fixable: false,
        }
    }

    pub fn error(
        step_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self::new(step_id, Severity::Error, code, message, suggestion)
    }

    pub fn warning(
        step_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self::new(step_id, Severity::Warning, code, message, suggestion)
    }

    pub fn fixable(mut self) -> Self {
        self.auto_fixable = true;
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.code, self.step_id, self.message
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// No error-severity issues remain.
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applied_fixes: Vec<AppliedFix>,
    pub workflow: Vec<WorkflowStep>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }
}

/// Runs the built-in checks against compiled workflows.
pub struct WorkflowValidator<'a> {
    registry: Option<&'a PluginRegistry>,
    settings: ValidatorSettings,
    checks: Vec<Box<dyn WorkflowCheck>>,
}

impl<'a> WorkflowValidator<'a> {
    /// Plugin/action schema checks are skipped without a registry.
    pub fn new(registry: Option<&'a PluginRegistry>, settings: ValidatorSettings) -> Self {
        let checks: Vec<Box<dyn WorkflowCheck>> = vec![
            Box::new(StepTypeCheck),
            Box::new(ConditionPresenceCheck),
            Box::new(EmbeddedTransformCheck),
            Box::new(TransformInputCheck),
            Box::new(VariableScopeCheck),
            Box::new(PluginSchemaCheck),
            Box::new(IteratorDeclarationCheck),
            Box::new(MapLogicCheck),
            Box::new(DependencyCheck),
            Box::new(DuplicateIdCheck),
            Box::new(DependencyCycleCheck),
        ];
        Self {
            registry,
            settings,
            checks,
        }
    }

    pub fn with_check(mut self, check: Box<dyn WorkflowCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Every issue in `workflow`, sorted.
    pub fn run(&self, workflow: &[WorkflowStep]) -> Vec<ValidationIssue> {
        let scan = WorkflowScan::new(workflow);
        let ctx = CheckContext {
            registry: self.registry,
            settings: &self.settings,
        };
        let mut issues: Vec<ValidationIssue> = self
            .checks
            .iter()
            .flat_map(|check| check.check(&scan, &ctx))
            .collect();
        issues.sort_by(|a, b| {
            b.severity
                .rank()
                .cmp(&a.severity.rank())
                .then(a.code.cmp(&b.code))
                .then(a.step_id.cmp(&b.step_id))
        });
        issues
    }

    pub fn validate(&self, workflow: &[WorkflowStep]) -> ValidationReport {
        let mut issues = self.run(workflow);
        let mut fixed = workflow.to_vec();
        let mut applied_fixes = Vec::new();

        if self.settings.auto_fix && issues.iter().any(|issue| issue.auto_fixable) {
            let (repaired, fixes) = apply_fixes(workflow);
            tracing::info!(fixes = fixes.len(), "applied auto-fixes");
            issues = self.run(&repaired);
            fixed = repaired;
            applied_fixes = fixes;
        }

        let valid = !issues.iter().any(|issue| issue.severity == Severity::Error);
        let errors = issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
            .count();
        tracing::info!(
            valid,
            errors,
            warnings = issues.len() - errors,
            steps = fixed.len(),
            "validated workflow"
        );
        ValidationReport {
            valid,
            issues,
            applied_fixes,
            workflow: fixed,
        }
    }
}
