#![allow(clippy::result_large_err)]

use crate::core::capability::{CapabilityRequest, PluginCategory};
use crate::core::compiler::context::{CompileContext, Pipeline};
use crate::core::error::AppError;
use crate::core::template;
use crate::core::types::ErrorCategory;
use intentflow_types::{DeliveryMethod, StepKind, WorkflowStep};
use serde_json::{json, Map, Value};

/// Summary names a later execution stage fills in. A body that only references
/// these has nothing to show at delivery time.
pub const RUNTIME_METADATA: &[&str] = &[
    "emails_scanned",
    "emails_processed",
    "items_processed",
    "processed_count",
    "rows_processed",
    "results_count",
    "total_count",
    "summary",
    "count",
    "total",
    "timestamp",
    "execution_time",
    "run_date",
];

const DEFAULT_SUBJECT: &str = "Workflow results";

/// Rewrites recipients that point at the grouping field to the per-group key.
#[derive(Debug, Clone)]
pub struct RecipientRewrite {
    pub field: String,
    pub item_variable: String,
}

impl RecipientRewrite {
    fn apply(&self, recipient: &str) -> String {
        let mentions_field = template::references(recipient)
            .iter()
            .any(|reference| reference.root() == self.field || reference.raw.ends_with(&format!(".{}", self.field)));
        if mentions_field {
            template::wrap(&format!("{}.key", self.item_variable))
        } else {
            recipient.to_string()
        }
    }
}

/// One delivery step reading the pipeline's current variable.
pub fn delivery_step(
    ctx: &mut CompileContext<'_>,
    pipeline: &Pipeline,
    method: &DeliveryMethod,
    config: &Map<String, Value>,
    rewrite: Option<&RecipientRewrite>,
) -> Result<WorkflowStep, AppError> {
    let current = pipeline.variable().unwrap_or("input");
    let (plugin, action, params) = match method {
        DeliveryMethod::Email => {
            let (plugin, action) = communication(ctx, config, ["email", "mail", "gmail", "outlook"])?;
            let mut params = Map::new();
            params.insert("recipients".to_string(), recipients(config, rewrite));
            params.insert("content".to_string(), content(config, current, true));
            (plugin, action, params)
        }
        DeliveryMethod::Slack => {
            let (plugin, action) = communication(ctx, config, ["slack"])?;
            let mut params = Map::new();
            let channel = first_text(config, &["channel", "channel_id", "recipient"])
                .map(|channel| apply_rewrite(&channel, rewrite))
                .unwrap_or_default();
            params.insert("channel".to_string(), Value::String(channel));
            params.insert("content".to_string(), content(config, current, false));
            (plugin, action, params)
        }
        DeliveryMethod::Sms => {
            let (plugin, action) = communication(ctx, config, ["sms", "twilio"])?;
            let mut params = Map::new();
            params.insert("recipients".to_string(), recipients(config, rewrite));
            params.insert("content".to_string(), content(config, current, false));
            (plugin, action, params)
        }
        DeliveryMethod::Webhook => {
            let mut params = Map::new();
            params.insert("url".to_string(), json!(first_text(config, &["url", "endpoint"]).unwrap_or_default()));
            params.insert("method".to_string(), json!("POST"));
            if let Some(headers) = config.get("headers") {
                params.insert("headers".to_string(), headers.clone());
            }
            params.insert("body".to_string(), Value::String(template::wrap(current)));
            ("http".to_string(), "post".to_string(), params)
        }
        DeliveryMethod::ApiCall => {
            let mut params = Map::new();
            params.insert("data".to_string(), Value::String(template::wrap(current)));
            match first_text(config, &["plugin_key", "plugin"]) {
                Some(plugin) => {
                    let operation = first_text(config, &["operation_type", "action"])
                        .unwrap_or_else(|| "send".to_string());
                    let resolved = ctx.resolve(&CapabilityRequest::plugin_action(plugin, operation))?;
                    (resolved.plugin_name, resolved.operation, params)
                }
                None => {
                    params.insert(
                        "url".to_string(),
                        json!(first_text(config, &["endpoint", "url"]).unwrap_or_default()),
                    );
                    params.insert("method".to_string(), json!("POST"));
                    ("http".to_string(), "post".to_string(), params)
                }
            }
        }
        DeliveryMethod::Database => {
            let mut params = Map::new();
            params.insert("table".to_string(), json!(first_text(config, &["table", "destination"]).unwrap_or_default()));
            params.insert("data".to_string(), Value::String(template::wrap(current)));
            ("database".to_string(), "insert".to_string(), params)
        }
        DeliveryMethod::File => {
            let path = first_text(config, &["path", "destination", "location"]).unwrap_or_default();
            let mut params = Map::new();
            params.insert(
                "format".to_string(),
                json!(first_text(config, &["format"]).unwrap_or_else(|| super::data_source::file_format(&path).to_string())),
            );
            params.insert("path".to_string(), Value::String(path));
            params.insert("content".to_string(), Value::String(template::wrap(current)));
            ("file-system".to_string(), "write_file".to_string(), params)
        }
        DeliveryMethod::Other(raw) => {
            return Err(AppError::new(
                ErrorCategory::UnsupportedPattern,
                format!("delivery method '{}' is not recognized", raw),
            )
            .with_code("IFC-DLV-001")
            .with_suggestion("use one of: email, slack, webhook, database, api_call, file, sms"));
        }
    };

    let step_id = ctx.next_id("deliver");
    tracing::debug!(step = %step_id, method = %method, plugin = %plugin, action = %action, "resolved delivery");
    Ok(WorkflowStep::new(step_id, StepKind::Action)
        .with_plugin(plugin, action)
        .with_params(params)
        .with_description(format!("Deliver results via {}", method))
        .depends_on(pipeline.dependencies()))
}

fn communication<const N: usize>(
    ctx: &CompileContext<'_>,
    config: &Map<String, Value>,
    keywords: [&str; N],
) -> Result<(String, String), AppError> {
    let resolved = match first_text(config, &["plugin_key", "plugin"]) {
        Some(plugin) => ctx.resolve(&CapabilityRequest::plugin_action(plugin, "send"))?,
        None => ctx.resolve(&CapabilityRequest::category_with_keywords(
            PluginCategory::Communication,
            "send",
            keywords,
        ))?,
    };
    Ok((resolved.plugin_name, resolved.operation))
}

fn first_text(config: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| config.get(*key))
        .find_map(|value| value.as_str().map(str::trim).filter(|text| !text.is_empty()))
        .map(str::to_string)
}

fn text_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(text)) if text.contains("{{") => vec![text.trim().to_string()],
        Some(Value::String(text)) => text
            .split([',', ';'])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn apply_rewrite(recipient: &str, rewrite: Option<&RecipientRewrite>) -> String {
    match rewrite {
        Some(rewrite) => rewrite.apply(recipient),
        None => recipient.to_string(),
    }
}

/// `{to, cc, bcc}` with dynamic `{{var}}` recipients preserved.
pub fn recipients(config: &Map<String, Value>, rewrite: Option<&RecipientRewrite>) -> Value {
    let mut to = text_list(config.get("recipient_source"));
    for key in ["to", "recipients", "recipient"] {
        to.extend(text_list(config.get(key)));
    }
    let mut to: Vec<String> = to.iter().map(|item| apply_rewrite(item, rewrite)).collect();
    dedup_in_order(&mut to);
    json!({
        "to": to,
        "cc": text_list(config.get("cc")),
        "bcc": text_list(config.get("bcc")),
    })
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

fn content(config: &Map<String, Value>, current: &str, with_subject: bool) -> Value {
    let body = first_text(config, &["body", "message", "template", "content"]);
    let mut content = Map::new();
    if with_subject {
        let subject = first_text(config, &["subject", "title"])
            .filter(|subject| !only_runtime_metadata(subject))
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
        content.insert("subject".to_string(), Value::String(subject));
    }
    content.insert(
        "body".to_string(),
        Value::String(sanitize_body(body.as_deref(), current)),
    );
    if let Some(format) = first_text(config, &["format"]) {
        content.insert("format".to_string(), Value::String(format));
    }
    Value::Object(content)
}

/// True when `text` has references and every one is a runtime-metadata name.
pub fn only_runtime_metadata(text: &str) -> bool {
    let references = template::references(text);
    !references.is_empty()
        && references
            .iter()
            .all(|reference| RUNTIME_METADATA.contains(&reference.root()))
}

/// Replace missing or metadata-only bodies with the pipeline data.
pub fn sanitize_body(body: Option<&str>, current: &str) -> String {
    match body {
        Some(body) if !only_runtime_metadata(body) => body.to_string(),
        _ => format!("Workflow results:\n\n{}", template::wrap(current)),
    }
}
