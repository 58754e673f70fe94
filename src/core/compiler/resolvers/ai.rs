use crate::core::compiler::context::{output_of, CompileContext, Pipeline};
use crate::core::compiler::normalize::is_decision_type;
use intentflow_types::{AiOperation, StepKind, WorkflowStep};
use serde_json::{Map, Value};

/// Chain one AI step per operation onto the pipeline.
pub fn resolve_ai_operations(
    ctx: &mut CompileContext<'_>,
    operations: &[&AiOperation],
    pipeline: &Pipeline,
) -> Vec<WorkflowStep> {
    let mut cursor = pipeline.clone();
    let mut steps = Vec::with_capacity(operations.len());
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
    steps
}

/// `llm_decision` for routing-style operations, `ai_processing` otherwise.
pub fn ai_step(
    ctx: &mut CompileContext<'_>,
    pipeline: &Pipeline,
    operation_type: &str,
    instruction: &str,
    output_schema: Option<&Value>,
    constraints: Option<&Value>,
) -> WorkflowStep {
    let step_id = ctx.next_id("ai");
    let kind = if is_decision_type(operation_type) {
        StepKind::LlmDecision
    } else {
        StepKind::AiProcessing
    };
    let mut config = Map::new();
    config.insert(
        "operation_type".to_string(),
        Value::String(operation_type.to_string()),
    );
    config.insert(
        "instruction".to_string(),
        Value::String(instruction.to_string()),
    );
    if let Some(schema) = output_schema {
        config.insert("output_schema".to_string(), schema.clone());
    }
    if let Some(constraints) = constraints {
        config.insert("constraints".to_string(), constraints.clone());
    }
    let description = if instruction.is_empty() {
        format!("AI {}", operation_type)
    } else {
        instruction.to_string()
    };
    WorkflowStep::new(step_id.clone(), kind)
        .with_input(pipeline.reference())
        .with_config(config)
        .with_output(output_of(&step_id))
        .with_description(description)
        .depends_on(pipeline.dependencies())
}
