//! Loop compilation: source extraction, AI matching against `do` lists, and
//! the scatter-gather / sequential loop step builders.

use super::ai::ai_step;
use crate::core::compiler::context::{output_of, CompileContext, Pipeline};
use crate::core::template;
use intentflow_types::{AiOperation, Loop, ScatterGather, StepKind, WorkflowStep};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Variable a loop iterates: `{{filtered_emails}}` -> `filtered_emails`,
/// `{{read_output.items}}` -> `read_output`.
pub fn source_variable(for_each: &str) -> String {
    let inner = template::unwrap(for_each).unwrap_or_else(|| for_each.trim());
    template::reference_root(inner).to_string()
}

fn source_reference(for_each: &str) -> String {
    if for_each.contains("{{") {
        for_each.trim().to_string()
    } else {
        template::wrap(for_each.trim())
    }
}

/// `extract_field` step producing the loop's source variable, when the pipeline
/// currently holds something else and nothing earlier produced it.
pub fn extract_source(
    ctx: &mut CompileContext<'_>,
    looped: &Loop,
    pipeline: &Pipeline,
    produced: &[WorkflowStep],
) -> Option<WorkflowStep> {
    let source = source_variable(&looped.for_each);
    if source.is_empty() || pipeline.variable() == Some(source.as_str()) || source == "input" {
        return None;
    }
    if produced
        .iter()
        .any(|step| step.output_variable.as_deref() == Some(source.as_str()) || step.step_id == source)
    {
        return None;
    }
    let step_id = ctx.next_id("extract_field");
    let mut config = Map::new();
    config.insert("field".to_string(), Value::String(source.clone()));
    config.insert("fallback_to_input".to_string(), json!(true));
    tracing::debug!(loop_id = %looped.id, source = %source, step = %step_id, "injecting extract_field step");
    Some(
        WorkflowStep::new(step_id, StepKind::Transform)
            .with_operation("extract_field")
            .with_input(pipeline.reference())
            .with_config(config)
            .with_output(source.clone())
            .with_description(format!("Extract {} for loop {}", source, looped.id))
            .depends_on(pipeline.dependencies()),
    )
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| word.len() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// AI operations a loop runs per item.
///
/// Each `do` entry matches by id first, then by keyword overlap with the
/// operation type or instruction. When no entry matches anything every
/// operation is used.
pub fn match_ai_operations<'o>(looped: &Loop, operations: &'o [AiOperation]) -> Vec<&'o AiOperation> {
    let mut matched: Vec<&AiOperation> = Vec::new();
    for entry in &looped.actions {
        let by_id = operations.iter().find(|operation| &operation.id == entry);
        let found = by_id.or_else(|| {
            let wanted = keywords(entry);
            operations.iter().find(|operation| {
                let offered =
                    keywords(&format!("{} {}", operation.operation_type, operation.instruction));
                !wanted.is_disjoint(&offered)
            })
        });
        if let Some(operation) = found {
            if !matched.iter().any(|existing| existing.id == operation.id) {
                matched.push(operation);
            }
        }
    }
    if matched.is_empty() {
        return operations.iter().collect();
    }
    matched
}

fn nested_body(
    ctx: &mut CompileContext<'_>,
    looped: &Loop,
    operations: &[&AiOperation],
) -> Vec<WorkflowStep> {
    let mut cursor = Pipeline::nested(looped.item_variable.clone());
    let mut steps = Vec::new();
    for operation in operations {
        let step = ai_step(
            ctx,
            &cursor,
            &operation.operation_type,
            &operation.instruction,
            operation.output_schema.as_ref(),
            operation.constraints.as_ref(),
        );
        cursor.advance(&step);
        steps.push(step);
    }
    if steps.is_empty() {
        let step_id = ctx.next_id("transform");
        let mut config = Map::new();
        config.insert("expression".to_string(), Value::String(looped.item_variable.clone()));
        steps.push(
            WorkflowStep::new(step_id.clone(), StepKind::Transform)
                .with_operation("map")
                .with_input(cursor.reference())
                .with_config(config)
                .with_output(output_of(&step_id))
                .with_description(format!("Pass each {} through", looped.item_variable)),
        );
    }
    steps
}

/// Scatter-gather over the loop source with the matched AI steps nested inside.
pub fn scatter_step(
    ctx: &mut CompileContext<'_>,
    looped: &Loop,
    operations: &[&AiOperation],
    pipeline: &Pipeline,
) -> WorkflowStep {
    let step_id = ctx.next_id("scatter");
    let actions = nested_body(ctx, looped, operations);
    let max_concurrency = looped
        .max_concurrency
        .unwrap_or(ctx.settings().default_max_concurrency);
    let mut step = WorkflowStep::new(step_id.clone(), StepKind::ScatterGather)
        .with_output(output_of(&step_id))
        .with_description(format!("Process each {} in parallel", looped.item_variable))
        .depends_on(pipeline.dependencies());
    if let Some(limit) = looped.max_iterations {
        let mut config = Map::new();
        config.insert("max_iterations".to_string(), json!(limit));
        step.config = config;
    }
    step.scatter = Some(ScatterGather {
        input: source_reference(&looped.for_each),
        item_variable: Some(looped.item_variable.clone()),
        max_concurrency: Some(max_concurrency),
        actions,
    });
    step
}

/// Sequential `loop` step, used where ordering across items matters.
pub fn loop_step(
    ctx: &mut CompileContext<'_>,
    looped: &Loop,
    operations: &[&AiOperation],
    pipeline: &Pipeline,
) -> WorkflowStep {
    let step_id = ctx.next_id("loop");
    let body = nested_body(ctx, looped, operations);
    let mut config = Map::new();
    if let Some(limit) = looped.max_iterations {
        config.insert("max_iterations".to_string(), json!(limit));
    }
    let mut step = WorkflowStep::new(step_id.clone(), StepKind::Loop)
        .with_input(source_reference(&looped.for_each))
        .with_config(config)
        .with_output(output_of(&step_id))
        .with_description(format!("For each {}", looped.item_variable))
        .depends_on(pipeline.dependencies());
    step.item_variable = Some(looped.item_variable.clone());
    step.loop_steps = body;
    step
}

/// Collapse the per-item result arrays of a scatter-gather.
pub fn flatten_step(ctx: &mut CompileContext<'_>, pipeline: &Pipeline) -> WorkflowStep {
    let step_id = ctx.next_id("flatten");
    let mut config = Map::new();
    config.insert("depth".to_string(), json!(1));
    WorkflowStep::new(step_id.clone(), StepKind::Transform)
        .with_operation("flatten")
        .with_input(pipeline.reference())
        .with_config(config)
        .with_output(output_of(&step_id))
        .with_description("Flatten per-item results")
        .depends_on(pipeline.dependencies())
}
