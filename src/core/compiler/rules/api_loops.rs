use super::helpers::{deliver_all, has_source, read_sources, unconsumed_ai};
use super::{CompileEstimate, CompilerRule};
use crate::core::compiler::context::{output_of, CompileContext, Pipeline};
use crate::core::compiler::resolvers::loops::source_variable;
use crate::core::compiler::resolvers::{
    extract_source, flatten_step, match_ai_operations, resolve_ai_operations, resolve_filters,
    resolve_transforms, scatter_step,
};
use crate::core::error::AppError;
use intentflow_types::{DataSourceType, IntentIr, StepKind, WorkflowStep};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

const TABLE_FORMATS: &[&str] = &["table", "html"];

/// API source processed item-by-item: each loop becomes a scatter-gather over
/// its collection followed by a flatten. Branches and grouping are left to the
/// general pipeline.
pub struct ApiLoopsRule;

impl CompilerRule for ApiLoopsRule {
    fn name(&self) -> &'static str {
        "api_loops"
    }

    fn priority(&self) -> u32 {
        200
    }

    fn description(&self) -> &'static str {
        "API source with per-item loops fanned out as scatter-gather"
    }

    fn supports(&self, ir: &IntentIr) -> bool {
        has_source(ir, &DataSourceType::Api)
            && !ir.loops.is_empty()
            && (!ir.ai_operations.is_empty() || !ir.transforms.is_empty() || !ir.filters.is_empty())
            && !ir.delivery.is_empty()
            && ir.conditionals.is_empty()
            && ir.grouping.is_none()
            && ir.partitions.is_empty()
    }

    fn compile(&self, ctx: &mut CompileContext<'_>) -> Result<Vec<WorkflowStep>, AppError> {
        let ir = ctx.ir;
        let mut out = Vec::new();
        let mut pipeline = read_sources(ctx, &mut out)?;

        let steps = resolve_filters(ctx, &ir.filters, &pipeline);
        pipeline.extend(&mut out, steps);

        let mut consumed = HashSet::new();
        for looped in &ir.loops {
            if let Some(extract) = extract_source(ctx, looped, &pipeline, &out) {
                pipeline.extend(&mut out, vec![extract]);
            }
            let operations = match_ai_operations(looped, &ir.ai_operations);
            consumed.extend(operations.iter().map(|operation| operation.id.clone()));
            let scatter = scatter_step(ctx, looped, &operations, &pipeline);
            pipeline.extend(&mut out, vec![scatter]);
            let flatten = flatten_step(ctx, &pipeline);
            pipeline.extend(&mut out, vec![flatten]);
        }

        let steps = resolve_transforms(ctx, &ir.transforms, &pipeline);
        pipeline.extend(&mut out, steps);

        if let Some(format) = table_format(ir) {
            let render = render_step(ctx, &pipeline, format);
            pipeline.extend(&mut out, vec![render]);
        }

        let steps = resolve_ai_operations(ctx, &unconsumed_ai(ir, &consumed), &pipeline);
        pipeline.extend(&mut out, steps);

        out.extend(deliver_all(ctx, &ir.delivery, &pipeline, None)?);
        Ok(out)
    }

    fn estimate(&self, ir: &IntentIr) -> CompileEstimate {
        let mut consumed = HashSet::new();
        let mut loop_steps = 0;
        let mut ai_steps = 0;
        for looped in &ir.loops {
            let operations = match_ai_operations(looped, &ir.ai_operations);
            let extract = usize::from(!source_variable(&looped.for_each).ends_with("_output"));
            loop_steps += extract + 1 + operations.len().max(1) + 1;
            ai_steps += operations.len();
            consumed.extend(operations.iter().map(|operation| operation.id.clone()));
        }
        let remaining = unconsumed_ai(ir, &consumed).len();
        CompileEstimate {
            total_steps: ir.data_sources.len()
                + ir.filters.len()
                + loop_steps
                + ir.transforms.len()
                + usize::from(table_format(ir).is_some())
                + remaining
                + ir.delivery.len(),
            ai_steps: ai_steps + remaining,
            scatter_steps: ir.loops.len(),
        }
    }
}

/// First table-like format any delivery asks for.
fn table_format(ir: &IntentIr) -> Option<&str> {
    ir.delivery.iter().find_map(|delivery| {
        delivery
            .config
            .get("format")
            .and_then(Value::as_str)
            .filter(|format| TABLE_FORMATS.contains(&format.to_lowercase().as_str()))
    })
}

fn render_step(ctx: &mut CompileContext<'_>, pipeline: &Pipeline, format: &str) -> WorkflowStep {
    let step_id = ctx.base_id("render_table");
    let mut config = Map::new();
    config.insert("format".to_string(), json!(format.to_lowercase()));
    WorkflowStep::new(step_id.clone(), StepKind::Transform)
        .with_operation("render_table")
        .with_input(pipeline.reference())
        .with_config(config)
        .with_output(output_of(&step_id))
        .with_description("Render results as a table")
        .depends_on(pipeline.dependencies())
}
