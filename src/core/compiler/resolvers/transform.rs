use crate::core::compiler::context::{output_of, CompileContext, Pipeline};
use crate::core::compiler::normalize::normalize_operator;
use intentflow_types::{StepKind, Transform, TransformOperation, WorkflowStep};
use serde_json::{json, Map, Value};

/// Chain one transform step per IR transform onto the pipeline.
pub fn resolve_transforms(
    ctx: &mut CompileContext<'_>,
    transforms: &[Transform],
    pipeline: &Pipeline,
) -> Vec<WorkflowStep> {
    let mut cursor = pipeline.clone();
    let mut steps = Vec::with_capacity(transforms.len());
    for transform in transforms {
        let step = transform_step(ctx, &cursor, transform.operation, &transform.config);
        cursor.advance(&step);
        steps.push(step);
    }
    steps
}

pub fn transform_step(
    ctx: &mut CompileContext<'_>,
    pipeline: &Pipeline,
    operation: TransformOperation,
    config: &Map<String, Value>,
) -> WorkflowStep {
    let step_id = ctx.next_id("transform");
    WorkflowStep::new(step_id.clone(), StepKind::Transform)
        .with_operation(operation.as_str())
        .with_input(pipeline.reference())
        .with_config(shape_config(operation, config))
        .with_output(output_of(&step_id))
        .with_description(format!("Apply {} transform", operation))
        .depends_on(pipeline.dependencies())
}

fn text(config: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .find_map(|key| config.get(*key))
        .filter(|value| !value.is_null())
        .cloned()
}

/// Fixed config shape per operation; IR keys are read under their common spellings.
pub fn shape_config(operation: TransformOperation, config: &Map<String, Value>) -> Map<String, Value> {
    let mut shaped = Map::new();
    let mut put = |key: &str, value: Option<Value>, default: Value| {
        shaped.insert(key.to_string(), value.unwrap_or(default));
    };
    match operation {
        TransformOperation::Sort => {
            put("field", text(config, &["field", "sort_by", "by"]), Value::Null);
            let order = text(config, &["order", "direction"])
                .and_then(|value| value.as_str().map(str::to_lowercase))
                .map(|order| if order.starts_with("desc") { "desc" } else { "asc" })
                .unwrap_or("asc");
            put("order", None, json!(order));
        }
        TransformOperation::Group => {
            put("group_by", text(config, &["group_by", "field", "by"]), Value::Null);
        }
        TransformOperation::Aggregate => {
            put("group_by", text(config, &["group_by", "by"]), Value::Null);
            put(
                "aggregations",
                text(config, &["aggregations", "metrics"]),
                json!([{
                    "field": config.get("field").cloned().unwrap_or(Value::Null),
                    "function": config.get("function").cloned().unwrap_or(json!("count")),
                }]),
            );
        }
        TransformOperation::Map => {
            put("expression", text(config, &["expression", "mapping", "fields"]), Value::Null);
        }
        TransformOperation::Reduce => {
            put("function", text(config, &["function", "operation", "reducer"]), json!("sum"));
            put("field", text(config, &["field"]), Value::Null);
            put("initial", text(config, &["initial", "initial_value"]), json!(0));
        }
        TransformOperation::Join => {
            put("with", text(config, &["with", "right", "source"]), Value::Null);
            put("on", text(config, &["on", "key", "field"]), Value::Null);
            put("type", text(config, &["type", "join_type"]), json!("inner"));
        }
        TransformOperation::Deduplicate => {
            put("fields", text(config, &["fields", "key", "field", "by"]), json!([]));
        }
        TransformOperation::Flatten => {
            put("depth", text(config, &["depth"]), json!(1));
        }
        TransformOperation::Filter => {
            let condition = match text(config, &["condition"]) {
                Some(condition) => condition,
                None => {
                    let operator = config
                        .get("operator")
                        .and_then(Value::as_str)
                        .map(normalize_operator)
                        .unwrap_or_else(|| "==".to_string());
                    json!({
                        "field": config.get("field").cloned().unwrap_or(Value::Null),
                        "operator": operator,
                        "value": config.get("value").cloned().unwrap_or(Value::Null),
                    })
                }
            };
            put("condition", Some(condition), Value::Null);
        }
    }
    shaped
}
