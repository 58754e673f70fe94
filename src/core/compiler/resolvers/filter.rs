use crate::core::compiler::context::{output_of, CompileContext, Pipeline};
use crate::core::compiler::normalize::normalize_operator;
use intentflow_types::{Filter, StepKind, WorkflowStep};
use serde_json::{Map, Value};

/// Chain one `transform/filter` step per filter onto the pipeline.
pub fn resolve_filters(
    ctx: &mut CompileContext<'_>,
    filters: &[Filter],
    pipeline: &Pipeline,
) -> Vec<WorkflowStep> {
    let mut cursor = pipeline.clone();
    let mut steps = Vec::with_capacity(filters.len());
    for filter in filters {
        let step = filter_step(
            ctx,
            &cursor,
            &filter.field,
            &filter.operator,
            &filter.value,
            filter.description.as_deref(),
        );
        cursor.advance(&step);
        steps.push(step);
    }
    steps
}

/// A single filter step reading the pipeline's current variable.
pub fn filter_step(
    ctx: &mut CompileContext<'_>,
    pipeline: &Pipeline,
    field: &str,
    operator: &str,
    value: &Value,
    description: Option<&str>,
) -> WorkflowStep {
    let step_id = ctx.next_id("filter");
    let operator = normalize_operator(operator);
    let mut config = Map::new();
    config.insert("field".to_string(), Value::String(field.to_string()));
    config.insert("operator".to_string(), Value::String(operator.clone()));
    config.insert("value".to_string(), value.clone());
    let description = description
        .map(str::to_string)
        .unwrap_or_else(|| format!("Keep rows where {} {} {}", field, operator, value));
    WorkflowStep::new(step_id.clone(), StepKind::Transform)
        .with_operation("filter")
        .with_input(pipeline.reference())
        .with_config(config)
        .with_output(output_of(&step_id))
        .with_description(description)
        .depends_on(pipeline.dependencies())
}
