#![allow(clippy::result_large_err)]

use crate::core::capability::{CapabilityRequest, PluginCategory};
use crate::core::compiler::context::{output_of, CompileContext};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use intentflow_types::{DataSource, DataSourceType, StepKind, WorkflowStep};
use serde_json::{json, Map, Value};

const HTTP_PLUGIN: &str = "http";
const DATABASE_PLUGIN: &str = "database";
const FILE_PLUGIN: &str = "file-system";
const STREAM_PLUGIN: &str = "stream";

const KNOWN_FILE_FORMATS: &[&str] = &["csv", "json", "txt", "pdf", "xlsx"];

/// One read (or trigger) step per data source, in declaration order.
pub fn resolve_data_sources(
    ctx: &mut CompileContext<'_>,
    sources: &[DataSource],
) -> Result<Vec<WorkflowStep>, AppError> {
    sources
        .iter()
        .map(|source| resolve_data_source(ctx, source))
        .collect()
}

/// Index of the source whose output feeds the pipeline.
pub fn primary_source_index(sources: &[DataSource]) -> usize {
    sources
        .iter()
        .position(|source| source.role.as_deref() == Some("primary"))
        .unwrap_or(0)
}

pub fn resolve_data_source(
    ctx: &mut CompileContext<'_>,
    source: &DataSource,
) -> Result<WorkflowStep, AppError> {
    let step = match &source.source_type {
        DataSourceType::Tabular => tabular(ctx, source)?,
        DataSourceType::Api => api(ctx, source)?,
        DataSourceType::Webhook => webhook(ctx, source),
        DataSourceType::Database => {
            let mut params = source_config(source);
            params
                .entry("table")
                .or_insert_with(|| Value::String(source.location.clone()));
            read_step(ctx, source, DATABASE_PLUGIN, "query", params)
        }
        DataSourceType::File => {
            let mut params = source_config(source);
            params.insert("path".to_string(), Value::String(source.location.clone()));
            params
                .entry("format")
                .or_insert_with(|| Value::String(file_format(&source.location).to_string()));
            read_step(ctx, source, FILE_PLUGIN, "read_file", params)
        }
        DataSourceType::Stream => {
            let mut params = source_config(source);
            let topic = if source.location.is_empty() {
                source.source.clone()
            } else {
                source.location.clone()
            };
            params.entry("topic").or_insert(Value::String(topic));
            read_step(ctx, source, STREAM_PLUGIN, "subscribe", params)
        }
        DataSourceType::Other(raw) => {
            return Err(AppError::new(
                ErrorCategory::UnsupportedPattern,
                format!("data source '{}' has unrecognized type '{}'", source.id, raw),
            )
            .with_code("IFC-SRC-001")
            .with_context("data_source", source.id.clone())
            .with_suggestion(
                "use one of: tabular, api, webhook, database, file, stream",
            ));
        }
    };
    tracing::debug!(
        source = %source.id,
        source_type = %source.source_type,
        step = %step.step_id,
        "resolved data source"
    );
    Ok(step)
}

fn tabular(ctx: &mut CompileContext<'_>, source: &DataSource) -> Result<WorkflowStep, AppError> {
    let narrowed = CapabilityRequest::category_with_keywords(
        PluginCategory::Tabular,
        "read",
        keywords_of(&source.source),
    );
    let resolved = match ctx.resolve(&narrowed) {
        Ok(resolved) => resolved,
        Err(_) => ctx.resolve(&CapabilityRequest::category(PluginCategory::Tabular, "read"))?,
    };
    let range = match source.tab.as_deref().filter(|tab| !tab.is_empty()) {
        Some(tab) => format!("{}!A:Z", tab),
        None => "A:Z".to_string(),
    };
    let mut params = source_config(source);
    params.insert(
        "spreadsheet_id".to_string(),
        Value::String(source.location.clone()),
    );
    params.insert("range".to_string(), Value::String(range));
    Ok(read_step(
        ctx,
        source,
        &resolved.plugin_name,
        &resolved.operation,
        params,
    ))
}

fn api(ctx: &mut CompileContext<'_>, source: &DataSource) -> Result<WorkflowStep, AppError> {
    let operation = source.operation_type.as_deref().unwrap_or("read");
    let declared = source
        .plugin_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .or_else(|| Some(source.source.as_str()).filter(|key| ctx.registry().contains(key)));

    if let Some(plugin) = declared {
        let resolved = ctx.resolve(&CapabilityRequest::plugin_action(plugin, operation))?;
        let mut params = source_config(source);
        if let Some(endpoint) = &source.endpoint {
            params
                .entry("endpoint")
                .or_insert_with(|| Value::String(endpoint.clone()));
        }
        return Ok(read_step(
            ctx,
            source,
            &resolved.plugin_name,
            &resolved.operation,
            params,
        ));
    }

    let url = source
        .endpoint
        .clone()
        .filter(|endpoint| !endpoint.is_empty())
        .unwrap_or_else(|| source.location.clone());
    let mut params = source_config(source);
    params.insert("url".to_string(), Value::String(url));
    params.insert("method".to_string(), json!("GET"));
    Ok(read_step(ctx, source, HTTP_PLUGIN, "get", params))
}

fn webhook(ctx: &mut CompileContext<'_>, source: &DataSource) -> WorkflowStep {
    let step_id = ctx.base_id("trigger");
    let path = source
        .endpoint
        .clone()
        .filter(|endpoint| !endpoint.is_empty())
        .unwrap_or_else(|| source.location.clone());
    let mut config = source_config(source);
    config.insert("source".to_string(), Value::String(source.source.clone()));
    config.insert("path".to_string(), Value::String(path));
    WorkflowStep::new(step_id.clone(), StepKind::Trigger)
        .with_config(config)
        .with_output(output_of(&step_id))
        .with_description(format!("Receive {} webhook events", source.source))
}

fn read_step(
    ctx: &mut CompileContext<'_>,
    source: &DataSource,
    plugin: &str,
    action: &str,
    params: Map<String, Value>,
) -> WorkflowStep {
    let step_id = ctx.base_id("read");
    let what = if source.source.is_empty() {
        source.source_type.to_string()
    } else {
        source.source.clone()
    };
    WorkflowStep::new(step_id.clone(), StepKind::Action)
        .with_plugin(plugin, action)
        .with_params(params)
        .with_output(output_of(&step_id))
        .with_description(format!("Read data from {}", what))
}

fn source_config(source: &DataSource) -> Map<String, Value> {
    source.config.clone().unwrap_or_default()
}

fn keywords_of(source: &str) -> Vec<String> {
    source
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| word.len() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// Format inferred from the file extension, `auto` when unknown.
pub fn file_format(location: &str) -> &'static str {
    let extension = location
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    KNOWN_FILE_FORMATS
        .iter()
        .find(|format| **format == extension)
        .copied()
        .unwrap_or("auto")
}
