use super::helpers::{all_ai, deliver_all, read_sources};
use super::{CompileEstimate, CompilerRule};
use crate::core::compiler::context::CompileContext;
use crate::core::compiler::resolvers::{resolve_ai_operations, resolve_filters, resolve_transforms};
use crate::core::error::AppError;
use intentflow_types::{IntentIr, WorkflowStep};

/// read -> filters -> transforms -> AI -> delivery, strictly in sequence.
pub struct SimpleLinearRule;

impl CompilerRule for SimpleLinearRule {
    fn name(&self) -> &'static str {
        "simple_linear"
    }

    fn priority(&self) -> u32 {
        100
    }

    fn description(&self) -> &'static str {
        "Linear pipeline without grouping, loops, or branches"
    }

    fn supports(&self, ir: &IntentIr) -> bool {
        !ir.data_sources.is_empty()
            && ir.partitions.is_empty()
            && ir.grouping.is_none()
            && ir.loops.is_empty()
            && ir.conditionals.is_empty()
    }

    fn compile(&self, ctx: &mut CompileContext<'_>) -> Result<Vec<WorkflowStep>, AppError> {
        let ir = ctx.ir;
        let mut out = Vec::new();
        let mut pipeline = read_sources(ctx, &mut out)?;

        let steps = resolve_filters(ctx, &ir.filters, &pipeline);
        pipeline.extend(&mut out, steps);
        let steps = resolve_transforms(ctx, &ir.transforms, &pipeline);
        pipeline.extend(&mut out, steps);
        let steps = resolve_ai_operations(ctx, &all_ai(ir), &pipeline);
        pipeline.extend(&mut out, steps);

        out.extend(deliver_all(ctx, &ir.delivery, &pipeline, None)?);
        Ok(out)
    }

    fn estimate(&self, ir: &IntentIr) -> CompileEstimate {
        CompileEstimate {
            total_steps: ir.data_sources.len()
                + ir.filters.len()
                + ir.transforms.len()
                + ir.ai_operations.len()
                + ir.delivery.len(),
            ai_steps: ir.ai_operations.len(),
            scatter_steps: 0,
        }
    }
}
