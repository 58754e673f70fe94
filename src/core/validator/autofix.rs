//! Deterministic repairs for auto-fixable issues.
//!
//! Fixes run on a deep copy: missing `dependencies` become `[]`, and every
//! `{expression}` / `{condition}` object embedded in action params is lifted
//! into a preceding `transform` step whose output the action then references.

use super::checks::{embedded_transforms, EmbeddedTransform, PathSegment};
use crate::core::template;
use chrono::Utc;
use intentflow_types::{StepKind, WorkflowStep};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

const INPUT_KEYS: &[&str] = &["input", "source", "from"];

/// Record of one applied repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedFix {
    pub code: String,
    pub step_id: String,
    pub description: String,
}

/// Fixed copy of `workflow` plus what changed.
pub fn apply_fixes(workflow: &[WorkflowStep]) -> (Vec<WorkflowStep>, Vec<AppliedFix>) {
    let mut fixed = workflow.to_vec();
    let mut fixer = Fixer {
        stamp: Utc::now().timestamp_millis(),
        taken: HashSet::new(),
        fixes: Vec::new(),
    };
    collect_ids(&fixed, &mut fixer.taken);
    fixer.fix_list(&mut fixed);
    (fixed, fixer.fixes)
}

fn collect_ids(steps: &[WorkflowStep], ids: &mut HashSet<String>) {
    for step in steps {
        ids.insert(step.step_id.clone());
        for nested in step.nested_scopes() {
            collect_ids(nested, ids);
        }
    }
}

struct Fixer {
    stamp: i64,
    taken: HashSet<String>,
    fixes: Vec<AppliedFix>,
}

impl Fixer {
    fn fix_list(&mut self, steps: &mut Vec<WorkflowStep>) {
        let mut out: Vec<WorkflowStep> = Vec::with_capacity(steps.len());
        for mut step in std::mem::take(steps) {
            if step.dependencies.is_none() {
                step.dependencies = Some(Vec::new());
                self.fixes.push(AppliedFix {
                    code: "MISSING_DEPENDENCIES".to_string(),
                    step_id: step.step_id.clone(),
                    description: "added empty dependencies array".to_string(),
                });
            }
            for nested in step.nested_scopes_mut() {
                self.fix_list(nested);
            }
            if step.kind == StepKind::Action {
                let previous_output = out.last().and_then(|prior| prior.output_variable.clone());
                for embedded in embedded_transforms(&step.params) {
                    if let Some(transform) = self.lift(&mut step, &embedded, previous_output.as_deref()) {
                        out.push(transform);
                    }
                }
            }
            out.push(step);
        }
        *steps = out;
    }

    fn next_id(&mut self) -> String {
        let base = format!("step_autofix_{}", self.stamp);
        if self.taken.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Replace the embedded object with a reference and return the transform computing it.
    fn lift(
        &mut self,
        action: &mut WorkflowStep,
        embedded: &EmbeddedTransform,
        previous_output: Option<&str>,
    ) -> Option<WorkflowStep> {
        let slot = value_at_mut(&mut action.params, &embedded.path)?;
        let Value::Object(blob) = slot.clone() else {
            return None;
        };
        let step_id = self.next_id();
        *slot = Value::String(template::wrap(&step_id));

        let input = INPUT_KEYS
            .iter()
            .find_map(|key| blob.get(*key).and_then(Value::as_str))
            .map(|source| {
                if source.contains("{{") {
                    source.to_string()
                } else {
                    template::wrap(source)
                }
            })
            .or_else(|| action.input.clone())
            .or_else(|| previous_output.map(template::wrap))
            .unwrap_or_else(|| template::wrap("input"));
        let config: Map<String, Value> = blob
            .into_iter()
            .filter(|(key, _)| !INPUT_KEYS.contains(&key.as_str()))
            .collect();
        let operation = if embedded.has_expression { "map" } else { "filter" };
        let path = embedded.display_path();

        let dependencies = action.dependencies.clone().unwrap_or_default();
        let mut transform = WorkflowStep::new(step_id.clone(), StepKind::Transform)
            .with_operation(operation)
            .with_input(input)
            .with_config(config)
            .with_output(step_id.clone())
            .with_description(format!("Compute '{}' for {}", path, action.step_id));
        transform.dependencies = Some(dependencies);
        action
            .dependencies
            .get_or_insert_with(Vec::new)
            .push(step_id.clone());

        tracing::info!(step = %action.step_id, transform = %step_id, param = %path, "lifted embedded transform out of action");
        self.fixes.push(AppliedFix {
            code: "TRANSFORM_BEFORE_ACTION".to_string(),
            step_id: action.step_id.clone(),
            description: format!(
                "moved '{}' into {} step '{}'",
                path, operation, step_id
            ),
        });
        Some(transform)
    }
}

fn value_at_mut<'v>(params: &'v mut Map<String, Value>, path: &[PathSegment]) -> Option<&'v mut Value> {
    let (first, rest) = path.split_first()?;
    let PathSegment::Key(key) = first else {
        return None;
    };
    let mut current = params.get_mut(key)?;
    for segment in rest {
        current = match segment {
            PathSegment::Key(key) => current.get_mut(key.as_str())?,
            PathSegment::Index(index) => current.get_mut(*index)?,
        };
    }
    Some(current)
}
