use super::helpers::{all_ai, common_issues, count_sources, deliver_all, delivers_per_group, has_source, read_sources};
use super::{CompileEstimate, CompilerRule, RuleIssue};
use crate::core::compiler::context::{output_of, CompileContext, Pipeline};
use crate::core::compiler::resolvers::{
    group_field, resolve_ai_operations, resolve_conditionals, resolve_filters, resolve_grouping,
    resolve_transforms, RecipientRewrite,
};
use crate::core::error::AppError;
use crate::core::template;
use crate::core::validator::Severity;
use intentflow_types::{DataSourceType, IntentIr, ScatterGather, StepKind, WorkflowStep};
use serde_json::{json, Map, Value};

const GROUP_VARIABLE: &str = "group";

/// One tabular source delivered per group: the rows are grouped and a single
/// scatter-gather renders and sends one message per group.
pub struct GroupedDeliveryRule;

impl CompilerRule for GroupedDeliveryRule {
    fn name(&self) -> &'static str {
        "grouped_delivery"
    }

    fn priority(&self) -> u32 {
        300
    }

    fn description(&self) -> &'static str {
        "Tabular source split into groups with one delivery per group"
    }

    fn supports(&self, ir: &IntentIr) -> bool {
        count_sources(ir, &DataSourceType::Tabular) == 1
            && !has_source(ir, &DataSourceType::Webhook)
            && !ir.delivery.is_empty()
            && delivers_per_group(ir)
            && ir.loops.is_empty()
            && ir.conditionals.iter().all(|conditional| conditional.is_simple())
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
        let steps = resolve_grouping(ctx, &ir.partitions, ir.grouping.as_ref(), &pipeline);
        pipeline.extend(&mut out, steps);

        out.push(deliver_per_group(ctx, &pipeline)?);
        Ok(out)
    }

    fn validate(&self, ir: &IntentIr) -> Vec<RuleIssue> {
        let mut issues = common_issues(ir);
        if group_field(ir).is_none() {
            issues.push(RuleIssue::new(
                "MISSING_GROUP_FIELD",
                Severity::Error,
                "grouped delivery needs a grouping key or a partition field",
                None,
            ));
        }
        issues
    }

    fn estimate(&self, ir: &IntentIr) -> CompileEstimate {
        let partition = usize::from(
            group_field(ir).is_some_and(|key| ir.partitions.iter().any(|p| p.field != key)),
        );
        let branch_steps: usize = ir
            .conditionals
            .iter()
            .map(|c| 1 + c.then.len() + c.otherwise.as_ref().map_or(0, Vec::len))
            .sum();
        CompileEstimate {
            total_steps: ir.data_sources.len()
                + ir.filters.len()
                + ir.transforms.len()
                + ir.ai_operations.len()
                + partition
                + 1
                + 1
                + 1
                + branch_steps
                + ir.delivery.len(),
            ai_steps: ir.ai_operations.len(),
            scatter_steps: 1,
        }
    }
}

/// Scatter-gather over the grouped rows whose body renders each group's table,
/// runs the conditionals and sends every delivery. Recipients that name the
/// group field are rewritten to the group key.
pub(super) fn deliver_per_group(
    ctx: &mut CompileContext<'_>,
    pipeline: &Pipeline,
) -> Result<WorkflowStep, AppError> {
    let ir = ctx.ir;
    let scatter_id = ctx.base_id("scatter_deliver");
    let rewrite = group_field(ir).map(|field| RecipientRewrite {
        field: field.to_string(),
        item_variable: GROUP_VARIABLE.to_string(),
    });

    let mut inner = Pipeline::nested(format!("{}.items", GROUP_VARIABLE));
    let mut actions = Vec::new();
    let render = render_table_step(ctx, ir, &inner);
    inner.extend(&mut actions, vec![render]);
    let steps = resolve_conditionals(ctx, &ir.conditionals, &inner, rewrite.as_ref())?;
    inner.extend(&mut actions, steps);
    actions.extend(deliver_all(ctx, &ir.delivery, &inner, rewrite.as_ref())?);

    let mut scatter = WorkflowStep::new(scatter_id.clone(), StepKind::ScatterGather)
        .with_output(output_of(&scatter_id))
        .with_description("Render and deliver results for each group")
        .depends_on(pipeline.dependencies());
    scatter.scatter = Some(ScatterGather {
        input: pipeline.reference(),
        item_variable: Some(GROUP_VARIABLE.to_string()),
        max_concurrency: Some(ctx.settings().default_max_concurrency),
        actions,
    });
    Ok(scatter)
}

/// Per-group table rendered inside the scatter body.
fn render_table_step(ctx: &mut CompileContext<'_>, ir: &IntentIr, inner: &Pipeline) -> WorkflowStep {
    let step_id = ctx.base_id("render_table");
    let mut config = Map::new();
    let format = ir
        .delivery
        .iter()
        .find_map(|delivery| delivery.config.get("format").and_then(Value::as_str))
        .unwrap_or("html");
    config.insert("format".to_string(), json!(format));
    if let Some(columns) = ir
        .delivery
        .iter()
        .find_map(|delivery| delivery.config.get("columns"))
    {
        config.insert("columns".to_string(), columns.clone());
    }
    config.insert(
        "title".to_string(),
        Value::String(template::wrap(&format!("{}.key", GROUP_VARIABLE))),
    );
    WorkflowStep::new(step_id.clone(), StepKind::Transform)
        .with_operation("render_table")
        .with_input(inner.reference())
        .with_config(config)
        .with_output(output_of(&step_id))
        .with_description("Render the group's rows as a table")
}
