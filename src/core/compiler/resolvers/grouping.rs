use crate::core::compiler::context::{output_of, CompileContext, Pipeline};
use intentflow_types::{Grouping, IntentIr, Partition, StepKind, WorkflowStep};
use serde_json::{json, Map, Value};

/// Field the grouped output is keyed by: the grouping key, else the first partition.
pub fn group_field(ir: &IntentIr) -> Option<&str> {
    ir.grouping
        .as_ref()
        .map(|grouping| grouping.group_by.as_str())
        .or_else(|| ir.partitions.first().map(|partition| partition.field.as_str()))
        .filter(|field| !field.is_empty())
}

/// Partition step for extra partition keys, then the group step.
pub fn resolve_grouping(
    ctx: &mut CompileContext<'_>,
    partitions: &[Partition],
    grouping: Option<&Grouping>,
    pipeline: &Pipeline,
) -> Vec<WorkflowStep> {
    let key = grouping
        .map(|grouping| grouping.group_by.as_str())
        .or_else(|| partitions.first().map(|partition| partition.field.as_str()))
        .filter(|field| !field.is_empty());
    let Some(key) = key else {
        return Vec::new();
    };

    let mut cursor = pipeline.clone();
    let mut steps = Vec::new();

    let extra: Vec<Value> = partitions
        .iter()
        .filter(|partition| partition.field != key)
        .map(|partition| Value::String(partition.field.clone()))
        .collect();
    if !extra.is_empty() {
        let step_id = ctx.base_id("partition");
        let mut config = Map::new();
        config.insert("fields".to_string(), Value::Array(extra));
        let step = WorkflowStep::new(step_id.clone(), StepKind::Transform)
            .with_operation("partition")
            .with_input(cursor.reference())
            .with_config(config)
            .with_output(output_of(&step_id))
            .with_description("Partition rows by key fields")
            .depends_on(cursor.dependencies());
        cursor.advance(&step);
        steps.push(step);
    }

    let step_id = ctx.base_id("group");
    let emit_per_group = grouping.map_or(true, |grouping| grouping.emit_per_group);
    let mut config = Map::new();
    config.insert("group_by".to_string(), json!(key));
    config.insert("emit_per_group".to_string(), json!(emit_per_group));
    let step = WorkflowStep::new(step_id.clone(), StepKind::Transform)
        .with_operation("group")
        .with_input(cursor.reference())
        .with_config(config)
        .with_output(output_of(&step_id))
        .with_description(format!("Group rows by {}", key))
        .depends_on(cursor.dependencies());
    steps.push(step);
    steps
}
