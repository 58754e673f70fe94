#![allow(clippy::result_large_err)]

//! Shape predicates and resolver sequences shared by the rules.

use super::RuleIssue;
use crate::core::compiler::context::{CompileContext, Pipeline};
use crate::core::compiler::resolvers::{
    delivery_step, primary_source_index, resolve_data_sources, RecipientRewrite,
};
use crate::core::error::AppError;
use crate::core::validator::Severity;
use intentflow_types::{
    AiOperation, DataSourceType, Delivery, DeliveryMethod, IntentIr, WorkflowStep,
};
use std::collections::HashSet;

pub fn count_sources(ir: &IntentIr, kind: &DataSourceType) -> usize {
    ir.data_sources
        .iter()
        .filter(|source| &source.source_type == kind)
        .count()
}

pub fn has_source(ir: &IntentIr, kind: &DataSourceType) -> bool {
    count_sources(ir, kind) > 0
}

pub fn emits_per_group(ir: &IntentIr) -> bool {
    ir.grouping
        .as_ref()
        .is_some_and(|grouping| grouping.emit_per_group)
}

/// Deliveries fan out once per group: partitions, or grouping with per-group emission.
pub fn delivers_per_group(ir: &IntentIr) -> bool {
    !ir.partitions.is_empty() || emits_per_group(ir)
}

/// Read every source; the pipeline continues from the primary one.
pub fn read_sources(
    ctx: &mut CompileContext<'_>,
    out: &mut Vec<WorkflowStep>,
) -> Result<Pipeline, AppError> {
    let ir = ctx.ir;
    let steps = resolve_data_sources(ctx, &ir.data_sources)?;
    let primary = primary_source_index(&ir.data_sources);
    let pipeline = steps
        .get(primary)
        .map(|step| {
            let mut pipeline = Pipeline::start();
            pipeline.advance(step);
            pipeline
        })
        .unwrap_or_default();
    out.extend(steps);
    Ok(pipeline)
}

/// Every delivery reads the same pipeline data, so none depends on another.
pub fn deliver_all(
    ctx: &mut CompileContext<'_>,
    deliveries: &[Delivery],
    pipeline: &Pipeline,
    rewrite: Option<&RecipientRewrite>,
) -> Result<Vec<WorkflowStep>, AppError> {
    deliveries
        .iter()
        .map(|delivery| delivery_step(ctx, pipeline, &delivery.method, &delivery.config, rewrite))
        .collect()
}

pub fn all_ai(ir: &IntentIr) -> Vec<&AiOperation> {
    ir.ai_operations.iter().collect()
}

pub fn unconsumed_ai<'a>(ir: &'a IntentIr, consumed: &HashSet<String>) -> Vec<&'a AiOperation> {
    ir.ai_operations
        .iter()
        .filter(|operation| !consumed.contains(&operation.id))
        .collect()
}

fn has_recipient(delivery: &Delivery) -> bool {
    ["to", "recipient", "recipients", "recipient_source"]
        .iter()
        .filter_map(|key| delivery.config.get(*key))
        .any(|value| match value {
            serde_json::Value::String(text) => !text.trim().is_empty(),
            serde_json::Value::Array(items) => !items.is_empty(),
            _ => false,
        })
}

/// Pre-checks every rule shares.
pub fn common_issues(ir: &IntentIr) -> Vec<RuleIssue> {
    let mut issues = Vec::new();
    if ir.data_sources.is_empty() {
        issues.push(RuleIssue::new(
            "NO_DATA_SOURCE",
            Severity::Error,
            "IR declares no data source",
            None,
        ));
    }
    if ir.delivery.is_empty() {
        issues.push(RuleIssue::new(
            "NO_DELIVERY",
            Severity::Warning,
            "IR declares no delivery; results will not leave the workflow",
            None,
        ));
    }
    for source in &ir.data_sources {
        if let DataSourceType::Other(raw) = &source.source_type {
            issues.push(RuleIssue::new(
                "UNKNOWN_SOURCE_TYPE",
                Severity::Error,
                format!("data source type '{}' is not recognized", raw),
                Some(source.id.clone()),
            ));
        }
    }
    for delivery in &ir.delivery {
        match &delivery.method {
            DeliveryMethod::Other(raw) => issues.push(RuleIssue::new(
                "UNKNOWN_DELIVERY_METHOD",
                Severity::Error,
                format!("delivery method '{}' is not recognized", raw),
                Some(delivery.id.clone()),
            )),
            DeliveryMethod::Email | DeliveryMethod::Sms if !has_recipient(delivery) => {
                issues.push(RuleIssue::new(
                    "MISSING_RECIPIENT",
                    Severity::Warning,
                    format!("{} delivery has no recipient", delivery.method),
                    Some(delivery.id.clone()),
                ))
            }
            _ => {}
        }
    }
    for looped in &ir.loops {
        if looped.for_each.trim().is_empty() {
            issues.push(RuleIssue::new(
                "EMPTY_LOOP_SOURCE",
                Severity::Error,
                "loop has no for_each source",
                Some(looped.id.clone()),
            ));
        }
        if looped.item_variable.trim().is_empty() {
            issues.push(RuleIssue::new(
                "MISSING_ITEM_VARIABLE",
                Severity::Error,
                "loop has no item_variable",
                Some(looped.id.clone()),
            ));
        }
    }
    issues
}
