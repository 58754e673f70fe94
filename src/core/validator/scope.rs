//! Lexical scopes of a compiled workflow.
//!
//! Every step (nested ones included) is flattened into a scan set together
//! with the names its references may use: prior step ids and outputs of its
//! own list and of every enclosing list, the iterator bound by an enclosing
//! loop or scatter-gather, and the builtin roots.

use crate::core::template::{self, TemplateReference};
use intentflow_types::WorkflowStep;
use std::collections::{HashMap, HashSet};

/// Roots the interpreter always provides.
pub const BUILTIN_ROOTS: &[&str] = &["input", "workflow", "env", "execution"];

/// One nesting level: the top-level list, or one nested list of a container step.
#[derive(Debug)]
pub struct ScopeFrame<'w> {
    pub steps: &'w [WorkflowStep],
    /// Step that owns this list, `None` for the top level.
    pub owner: Option<&'w WorkflowStep>,
    pub iterator: Option<String>,
    pub iterator_inferred: bool,
}

/// A step plus the scope information its checks need.
#[derive(Debug)]
pub struct ScannedStep<'w> {
    pub step: &'w WorkflowStep,
    pub frame: usize,
    pub index: usize,
    /// Names the step's own references may resolve to.
    pub visible: HashSet<String>,
    /// Step ids a dependency may point at.
    pub dependency_ids: HashSet<String>,
    /// Iterator of the innermost enclosing loop or scatter-gather.
    pub enclosing_iterator: Option<String>,
}

#[derive(Debug)]
pub struct WorkflowScan<'w> {
    pub frames: Vec<ScopeFrame<'w>>,
    pub steps: Vec<ScannedStep<'w>>,
    /// Every id and output variable in the workflow, plus the builtin roots.
    pub known_names: HashSet<String>,
}

impl<'w> WorkflowScan<'w> {
    pub fn new(workflow: &'w [WorkflowStep]) -> Self {
        let mut known_names: HashSet<String> =
            BUILTIN_ROOTS.iter().map(|root| root.to_string()).collect();
        collect_names(workflow, &mut known_names);

        let mut scan = WorkflowScan {
            frames: Vec::new(),
            steps: Vec::new(),
            known_names,
        };
        let visible = BUILTIN_ROOTS.iter().map(|root| root.to_string()).collect();
        scan.walk(workflow, None, None, false, visible, &HashSet::new(), None);
        scan
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        steps: &'w [WorkflowStep],
        owner: Option<&'w WorkflowStep>,
        iterator: Option<String>,
        iterator_inferred: bool,
        mut visible: HashSet<String>,
        outer_ids: &HashSet<String>,
        enclosing_iterator: Option<String>,
    ) {
        let frame = self.frames.len();
        self.frames.push(ScopeFrame {
            steps,
            owner,
            iterator: iterator.clone(),
            iterator_inferred,
        });
        if let Some(name) = &iterator {
            visible.insert(name.clone());
        }
        let enclosing_iterator = iterator.or(enclosing_iterator);

        let mut dependency_ids = outer_ids.clone();
        dependency_ids.extend(steps.iter().map(|step| step.step_id.clone()));

        for (index, step) in steps.iter().enumerate() {
            self.steps.push(ScannedStep {
                step,
                frame,
                index,
                visible: visible.clone(),
                dependency_ids: dependency_ids.clone(),
                enclosing_iterator: enclosing_iterator.clone(),
            });

            let (nested_iterator, inferred) = if step.is_iterating() {
                match step.declared_item_variable() {
                    Some(name) => (Some(name.to_string()), false),
                    None => {
                        let nested: Vec<&WorkflowStep> =
                            step.nested_scopes().into_iter().flatten().collect();
                        (infer_iterator_variable(&nested, &self.known_names), true)
                    }
                }
            } else {
                (None, false)
            };
            for nested in step.nested_scopes() {
                self.walk(
                    nested,
                    Some(step),
                    nested_iterator.clone(),
                    inferred,
                    visible.clone(),
                    &dependency_ids,
                    enclosing_iterator.clone(),
                );
            }

            visible.insert(step.step_id.clone());
            if let Some(output) = &step.output_variable {
                visible.insert(output.clone());
            }
        }
    }

    /// Position of `step_id` in `frame`, if it is declared there.
    pub fn index_in_frame(&self, frame: usize, step_id: &str) -> Option<usize> {
        self.frames
            .get(frame)
            .and_then(|scope| scope.steps.iter().position(|step| step.step_id == step_id))
    }
}

fn collect_names(steps: &[WorkflowStep], names: &mut HashSet<String>) {
    for step in steps {
        names.insert(step.step_id.clone());
        if let Some(output) = &step.output_variable {
            names.insert(output.clone());
        }
        for nested in step.nested_scopes() {
            collect_names(nested, names);
        }
    }
}

/// References a step makes in its own fields, nested steps excluded.
pub fn step_references(step: &WorkflowStep) -> Vec<TemplateReference> {
    let mut out = Vec::new();
    if let Some(input) = &step.input {
        out.extend(template::references(input));
    }
    if let Some(scatter) = &step.scatter {
        out.extend(template::references(&scatter.input));
    }
    if let Some(condition) = &step.condition {
        template::collect_value_references(condition, &mut out);
    }
    for value in step.params.values().chain(step.config.values()) {
        template::collect_value_references(value, &mut out);
    }
    out
}

fn references_deep(steps: &[&WorkflowStep], out: &mut Vec<TemplateReference>) {
    for step in steps {
        out.extend(step_references(step));
        for nested in step.nested_scopes() {
            let nested: Vec<&WorkflowStep> = nested.iter().collect();
            references_deep(&nested, out);
        }
    }
}

/// Iterator name for a loop or scatter-gather that does not declare one.
///
/// Counts the roots of every non-expression reference in the nested steps,
/// ignoring names that are step ids, outputs or builtin roots, and returns the
/// most frequent. Ties go to the root seen first.
pub fn infer_iterator_variable(
    nested: &[&WorkflowStep],
    known_names: &HashSet<String>,
) -> Option<String> {
    let mut references = Vec::new();
    references_deep(nested, &mut references);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for reference in references.iter().filter(|reference| !reference.is_expression()) {
        let root = reference.root();
        if root.is_empty() || known_names.contains(root) {
            continue;
        }
        let count = counts.entry(root).or_insert(0);
        if *count == 0 {
            order.push(root);
        }
        *count += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for root in order {
        let count = counts.get(root).copied().unwrap_or(0);
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((root, count));
        }
    }
    best.map(|(root, _)| root.to_string())
}
