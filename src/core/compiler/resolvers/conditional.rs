#![allow(clippy::result_large_err)]

use super::ai::ai_step;
use super::delivery::{delivery_step, RecipientRewrite};
use super::filter::filter_step;
use super::transform::transform_step;
use crate::core::compiler::context::{CompileContext, Pipeline};
use crate::core::compiler::normalize::normalize_operator;
use crate::core::error::AppError;
use intentflow_types::{Condition, Conditional, IntentAction, StepKind, WorkflowStep};
use serde_json::{json, Value};

/// One `conditional` step per IR conditional, branches compiled into nested steps.
pub fn resolve_conditionals(
    ctx: &mut CompileContext<'_>,
    conditionals: &[Conditional],
    pipeline: &Pipeline,
    rewrite: Option<&RecipientRewrite>,
) -> Result<Vec<WorkflowStep>, AppError> {
    let mut cursor = pipeline.clone();
    let mut steps = Vec::with_capacity(conditionals.len());
    for conditional in conditionals {
        let step_id = ctx.next_id("conditional");
        let branch_input = Pipeline::nested(cursor.variable().unwrap_or("input"));
        let then_steps = resolve_actions(ctx, &conditional.then, &branch_input, rewrite)?;
        let else_steps = match &conditional.otherwise {
            Some(actions) => resolve_actions(ctx, actions, &branch_input, rewrite)?,
            None => Vec::new(),
        };
        let description = match &conditional.id {
            Some(id) => format!("Branch on {}", id),
            None => "Branch on condition".to_string(),
        };
        let mut step = WorkflowStep::new(step_id, StepKind::Conditional)
            .with_input(cursor.reference())
            .with_description(description)
            .depends_on(cursor.dependencies());
        step.condition = Some(condition_to_dsl(&conditional.when));
        step.then_steps = then_steps;
        step.else_steps = else_steps;
        cursor.advance(&step);
        steps.push(step);
    }
    Ok(steps)
}

/// Branch actions chained in order from the branch's input.
pub fn resolve_actions(
    ctx: &mut CompileContext<'_>,
    actions: &[IntentAction],
    pipeline: &Pipeline,
    rewrite: Option<&RecipientRewrite>,
) -> Result<Vec<WorkflowStep>, AppError> {
    let mut cursor = pipeline.clone();
    let mut steps = Vec::with_capacity(actions.len());
    for action in actions {
        let step = match action {
            IntentAction::Delivery { method, config } => {
                delivery_step(ctx, &cursor, method, config, rewrite)?
            }
            IntentAction::AiOperation {
                operation,
                instruction,
                output_schema,
                ..
            } => ai_step(ctx, &cursor, operation, instruction, output_schema.as_ref(), None),
            IntentAction::Transform { operation, config } => {
                transform_step(ctx, &cursor, *operation, config)
            }
            IntentAction::Filter {
                field,
                operator,
                value,
            } => filter_step(ctx, &cursor, field, operator, value, None),
        };
        cursor.advance(&step);
        steps.push(step);
    }
    Ok(steps)
}

/// Equivalent DSL condition tree: `simple`, `and`, `or`, `not`.
pub fn condition_to_dsl(condition: &Condition) -> Value {
    match condition {
        Condition::Simple {
            field,
            operator,
            value,
        } => json!({
            "type": "simple",
            "field": field,
            "operator": normalize_operator(operator),
            "value": value,
        }),
        Condition::ComplexAnd { conditions } => json!({
            "type": "and",
            "conditions": conditions.iter().map(condition_to_dsl).collect::<Vec<_>>(),
        }),
        Condition::ComplexOr { conditions } => json!({
            "type": "or",
            "conditions": conditions.iter().map(condition_to_dsl).collect::<Vec<_>>(),
        }),
        Condition::ComplexNot { conditions } => {
            let inner = match conditions.as_slice() {
                [single] => condition_to_dsl(single),
                many => json!({
                    "type": "and",
                    "conditions": many.iter().map(condition_to_dsl).collect::<Vec<_>>(),
                }),
            };
            json!({"type": "not", "condition": inner})
        }
    }
}
