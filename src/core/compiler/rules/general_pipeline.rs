use super::grouped_delivery::deliver_per_group;
use super::helpers::{deliver_all, delivers_per_group, read_sources, unconsumed_ai};
use super::{CompileEstimate, CompilerRule};
use crate::core::compiler::context::CompileContext;
use crate::core::compiler::resolvers::{
    extract_source, group_field, loop_step, match_ai_operations, resolve_ai_operations,
    resolve_conditionals, resolve_filters, resolve_grouping, resolve_transforms,
};
use crate::core::error::AppError;
use intentflow_types::{IntentIr, WorkflowStep};
use std::collections::HashSet;

/// Fallback for every IR with a data source: each fragment kind in a fixed
/// order, loops as sequential `loop` steps. Per-group delivery groups last and
/// sends from a scatter-gather over the groups.
pub struct GeneralPipelineRule;

impl CompilerRule for GeneralPipelineRule {
    fn name(&self) -> &'static str {
        "general_pipeline"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn description(&self) -> &'static str {
        "Fallback pipeline covering every fragment kind"
    }

    fn supports(&self, ir: &IntentIr) -> bool {
        !ir.data_sources.is_empty()
    }

    fn compile(&self, ctx: &mut CompileContext<'_>) -> Result<Vec<WorkflowStep>, AppError> {
        let ir = ctx.ir;
        let mut out = Vec::new();
        let mut pipeline = read_sources(ctx, &mut out)?;

        let steps = resolve_filters(ctx, &ir.filters, &pipeline);
        pipeline.extend(&mut out, steps);
        let steps = resolve_transforms(ctx, &ir.transforms, &pipeline);
        pipeline.extend(&mut out, steps);
        let per_group = per_group(ir);
        if !per_group {
            let steps = resolve_grouping(ctx, &ir.partitions, ir.grouping.as_ref(), &pipeline);
            pipeline.extend(&mut out, steps);
        }

        let mut consumed = HashSet::new();
        for looped in &ir.loops {
            if let Some(extract) = extract_source(ctx, looped, &pipeline, &out) {
                pipeline.extend(&mut out, vec![extract]);
            }
            let operations = match_ai_operations(looped, &ir.ai_operations);
            consumed.extend(operations.iter().map(|operation| operation.id.clone()));
            let step = loop_step(ctx, looped, &operations, &pipeline);
            pipeline.extend(&mut out, vec![step]);
        }

        let steps = resolve_ai_operations(ctx, &unconsumed_ai(ir, &consumed), &pipeline);
        pipeline.extend(&mut out, steps);

        if per_group {
            let steps = resolve_grouping(ctx, &ir.partitions, ir.grouping.as_ref(), &pipeline);
            pipeline.extend(&mut out, steps);
            out.push(deliver_per_group(ctx, &pipeline)?);
            return Ok(out);
        }

        let steps = resolve_conditionals(ctx, &ir.conditionals, &pipeline, None)?;
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
            loop_steps += 1 + operations.len().max(1);
            ai_steps += operations.len();
            consumed.extend(operations.iter().map(|operation| operation.id.clone()));
        }
        let remaining = unconsumed_ai(ir, &consumed).len();
        let branch_steps: usize = ir
            .conditionals
            .iter()
            .map(|c| 1 + c.then.len() + c.otherwise.as_ref().map_or(0, Vec::len))
            .sum();
        let per_group = per_group(ir);
        CompileEstimate {
            total_steps: ir.data_sources.len()
                + ir.filters.len()
                + ir.transforms.len()
                + usize::from(group_field(ir).is_some())
                + loop_steps
                + remaining
                + branch_steps
                + 2 * usize::from(per_group)
                + ir.delivery.len(),
            ai_steps: ai_steps + remaining,
            scatter_steps: usize::from(per_group),
        }
    }
}

fn per_group(ir: &IntentIr) -> bool {
    delivers_per_group(ir) && group_field(ir).is_some()
}
