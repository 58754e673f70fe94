use intentflow::core::config::{CompilerSettings, IntentflowConfig, ValidatorSettings};
use intentflow::core::registry::PluginRegistry;
use intentflow::core::Compiler;
use intentflow::types::{IntentIr, StepKind, WorkflowStep};
use serde_json::json;
use std::path::Path;

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn registry() -> PluginRegistry {
    PluginRegistry::load_from_file(&fixture("registry_v1.json")).expect("fixture registry loads")
}

fn ids(steps: &[WorkflowStep]) -> Vec<&str> {
    steps.iter().map(|step| step.step_id.as_str()).collect()
}

#[test]
fn grouped_sales_leads_compile_to_one_scatter_per_group() {
    let registry = registry();
    let config = IntentflowConfig::default();
    let text = std::fs::read_to_string(fixture("ir_grouped_sales.json")).unwrap();
    let ir: IntentIr = serde_json::from_str(&text).unwrap();

    let output = Compiler::new(&registry, &config).compile(&ir).unwrap();
    assert_eq!(output.rule, "grouped_delivery");
    assert_eq!(ids(&output.steps), vec!["read", "filter_1", "group", "scatter_deliver"]);

    let read = &output.steps[0];
    assert_eq!(read.plugin.as_deref(), Some("google-sheets"));
    assert_eq!(read.action.as_deref(), Some("read_range"));
    assert_eq!(read.params["range"], json!("Leads!A:Z"));

    let scatter_step = &output.steps[3];
    assert_eq!(scatter_step.kind, StepKind::ScatterGather);
    let scatter = scatter_step.scatter.as_ref().expect("scatter block");
    assert_eq!(scatter.input, "{{group_output}}");
    assert_eq!(scatter.item_variable.as_deref(), Some("group"));
    assert_eq!(scatter.max_concurrency, Some(5));

    let delivery = scatter
        .actions
        .iter()
        .find(|step| step.kind == StepKind::Action)
        .expect("nested delivery");
    assert_eq!(delivery.action.as_deref(), Some("send_email"));
    assert_eq!(delivery.params["recipients"]["to"], json!(["{{group.key}}"]));
    assert_eq!(delivery.params["content"]["subject"], json!("Your stage 4 leads"));

    let report = output.validation.as_ref().expect("validation ran");
    assert!(report.valid, "issues: {:?}", report.issues);
    assert!(report.applied_fixes.is_empty());
}

#[test]
fn loop_over_unproduced_variable_injects_extract_field_and_flatten() {
    let registry = registry();
    let config = IntentflowConfig::default();
    let text = std::fs::read_to_string(fixture("ir_email_triage.yaml")).unwrap();
    let ir: IntentIr = serde_yaml::from_str(&text).unwrap();

    let output = Compiler::new(&registry, &config).compile(&ir).unwrap();
    assert_eq!(output.rule, "api_loops");
    assert_eq!(
        ids(&output.steps),
        vec!["read", "filter_1", "extract_field_1", "scatter_1", "flatten_1", "deliver_1"]
    );

    assert_eq!(output.steps[0].plugin.as_deref(), Some("gmail"));
    assert_eq!(output.steps[0].action.as_deref(), Some("list_messages"));

    let extract = &output.steps[2];
    assert_eq!(extract.operation.as_deref(), Some("extract_field"));
    assert_eq!(extract.input.as_deref(), Some("{{filter_1_output}}"));
    assert_eq!(extract.output_variable.as_deref(), Some("filtered_emails"));

    let scatter = output.steps[3].scatter.as_ref().expect("scatter block");
    assert_eq!(scatter.input, "{{filtered_emails}}");
    assert_eq!(scatter.item_variable.as_deref(), Some("email"));
    assert_eq!(ids(&scatter.actions), vec!["ai_1"]);
    assert_eq!(scatter.actions[0].input.as_deref(), Some("{{email}}"));

    let flatten = &output.steps[4];
    assert_eq!(flatten.operation.as_deref(), Some("flatten"));
    assert_eq!(flatten.input.as_deref(), Some("{{scatter_1_output}}"));
    assert_eq!(flatten.dependencies, Some(vec!["scatter_1".to_string()]));

    assert!(output.is_valid(), "issues: {:?}", output.validation);
    assert_eq!(output.estimate.scatter_steps, 1);
    assert_eq!(output.estimate.ai_steps, 1);
}

#[test]
fn compilation_is_deterministic() {
    let registry = registry();
    let config = IntentflowConfig::default();
    let text = std::fs::read_to_string(fixture("ir_grouped_sales.json")).unwrap();
    let ir: IntentIr = serde_json::from_str(&text).unwrap();
    let compiler = Compiler::new(&registry, &config);

    let first = compiler.compile(&ir).unwrap();
    let second = compiler.compile(&ir).unwrap();
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.steps, second.steps);
    assert_eq!(first.fingerprint.len(), 64);
}

#[test]
fn simple_linear_chain_threads_the_current_variable() {
    let registry = registry();
    let config = IntentflowConfig::default();
    let ir: IntentIr = serde_json::from_value(json!({
        "data_sources": [{"id": "orders", "type": "database", "source": "orders", "location": "orders"}],
        "filters": [{"id": "big", "field": "total", "operator": "greater than", "value": 100}],
        "transforms": [{"operation": "sort", "config": {"field": "total", "order": "desc"}}],
        "ai_operations": [{"id": "sum", "type": "summarize", "instruction": "Summarize the orders"}],
        "delivery": [
            {"id": "mail", "method": "email", "config": {"to": "ops@example.com", "body": "{{summary}}"}},
            {"id": "archive", "method": "file", "config": {"path": "orders.json"}}
        ]
    }))
    .unwrap();

    let output = Compiler::new(&registry, &config).compile(&ir).unwrap();
    assert_eq!(output.rule, "simple_linear");
    assert_eq!(
        ids(&output.steps),
        vec!["read", "filter_1", "transform_1", "ai_1", "deliver_1", "deliver_2"]
    );
    assert_eq!(output.steps[1].input.as_deref(), Some("{{read_output}}"));
    assert_eq!(output.steps[2].input.as_deref(), Some("{{filter_1_output}}"));
    assert_eq!(output.steps[3].input.as_deref(), Some("{{transform_1_output}}"));

    let mail = &output.steps[4];
    assert_eq!(
        mail.params["content"]["body"],
        json!("Workflow results:\n\n{{ai_1_output}}")
    );
    assert_eq!(mail.dependencies, Some(vec!["ai_1".to_string()]));

    let archive = &output.steps[5];
    assert_eq!(archive.plugin.as_deref(), Some("file-system"));
    assert_eq!(archive.params["format"], json!("json"));
    assert_eq!(archive.dependencies, Some(vec!["ai_1".to_string()]));
    assert!(output.is_valid(), "issues: {:?}", output.validation);
}

#[test]
fn general_pipeline_compiles_loops_and_branches() {
    let registry = registry();
    let config = IntentflowConfig::default();
    let ir: IntentIr = serde_json::from_value(json!({
        "data_sources": [{"id": "tickets", "type": "file", "source": "tickets", "location": "tickets.csv"}],
        "ai_operations": [{"id": "triage", "type": "classify", "instruction": "Classify the ticket"}],
        "loops": [{"id": "each", "for_each": "{{read_output}}", "item_variable": "ticket", "do": ["triage"]}],
        "conditionals": [{
            "when": {"type": "complex_and", "conditions": [
                {"type": "simple", "field": "priority", "operator": "equals", "value": "high"},
                {"type": "simple", "field": "open", "operator": "is", "value": true}
            ]},
            "then": [{"type": "delivery", "method": "slack", "config": {"channel": "#oncall"}}],
            "else": [{"type": "delivery", "method": "email", "config": {"to": "queue@example.com"}}]
        }],
        "delivery": [{"id": "log", "method": "database", "config": {"table": "ticket_log"}}]
    }))
    .unwrap();

    let output = Compiler::new(&registry, &config).compile(&ir).unwrap();
    assert_eq!(output.rule, "general_pipeline");

    let looped = output
        .steps
        .iter()
        .find(|step| step.kind == StepKind::Loop)
        .expect("loop step");
    assert_eq!(looped.item_variable.as_deref(), Some("ticket"));
    assert_eq!(looped.loop_steps.len(), 1);
    assert_eq!(looped.loop_steps[0].kind, StepKind::LlmDecision);

    let branch = output
        .steps
        .iter()
        .find(|step| step.kind == StepKind::Conditional)
        .expect("conditional step");
    assert_eq!(branch.then_steps.len(), 1);
    assert_eq!(branch.else_steps.len(), 1);
    assert_eq!(branch.condition.as_ref().expect("condition")["type"], json!("and"));

    assert!(output.is_valid(), "issues: {:?}", output.validation);
}

#[test]
fn unknown_delivery_method_is_a_hard_failure() {
    let registry = registry();
    let config = IntentflowConfig::default();
    let ir: IntentIr = serde_json::from_value(json!({
        "data_sources": [{"id": "s", "type": "database", "source": "orders", "location": "orders"}],
        "delivery": [{"id": "d", "method": "carrier_pigeon"}]
    }))
    .unwrap();
    let err = Compiler::new(&registry, &config).compile(&ir).unwrap_err();
    assert_eq!(err.code, "IFC-DLV-001");
}

#[test]
fn unknown_source_type_is_a_hard_failure() {
    let registry = registry();
    let config = IntentflowConfig::default();
    let ir: IntentIr = serde_json::from_value(json!({
        "data_sources": [{"id": "s", "type": "ftp", "source": "legacy", "location": "/in"}],
        "delivery": [{"id": "d", "method": "webhook", "config": {"url": "https://hook"}}]
    }))
    .unwrap();
    let err = Compiler::new(&registry, &config).compile(&ir).unwrap_err();
    assert_eq!(err.code, "IFC-SRC-001");
}

#[test]
fn validation_can_be_disabled() {
    let registry = registry();
    let settings = CompilerSettings {
        validate_output: false,
        ..CompilerSettings::default()
    };
    let ir: IntentIr = serde_json::from_value(json!({
        "data_sources": [{"id": "s", "type": "stream", "source": "events", "location": "orders.created"}],
        "delivery": [{"id": "d", "method": "webhook", "config": {"url": "https://hook"}}]
    }))
    .unwrap();
    let output = Compiler::with_settings(&registry, settings, ValidatorSettings::default())
        .compile(&ir)
        .unwrap();
    assert!(output.validation.is_none());
    assert!(output.is_valid());
    assert_eq!(output.steps[0].params["topic"], json!("orders.created"));
}

#[test]
fn concurrency_default_comes_from_settings() {
    let registry = registry();
    let mut config = IntentflowConfig::default();
    config.compiler.default_max_concurrency = 12;
    let text = std::fs::read_to_string(fixture("ir_email_triage.yaml")).unwrap();
    let ir: IntentIr = serde_yaml::from_str(&text).unwrap();
    let output = Compiler::new(&registry, &config).compile(&ir).unwrap();
    let scatter = output.steps[3].scatter.as_ref().expect("scatter block");
    assert_eq!(scatter.max_concurrency, Some(12));
}

#[test]
fn general_pipeline_delivers_per_group_after_loops() {
    let registry = registry();
    let config = IntentflowConfig::default();
    let ir: IntentIr = serde_json::from_value(json!({
        "data_sources": [{"id": "orders", "type": "file", "source": "orders", "location": "orders.json"}],
        "loops": [{"id": "each", "for_each": "{{read_output}}", "item_variable": "order"}],
        "grouping": {"group_by": "owner", "emit_per_group": true},
        "delivery": [{"id": "d", "method": "email", "config": {"recipient_source": "{{owner}}"}}]
    }))
    .unwrap();

    let output = Compiler::new(&registry, &config).compile(&ir).unwrap();
    assert_eq!(output.rule, "general_pipeline");

    let count = output.steps.len();
    let group = &output.steps[count - 2];
    assert_eq!(group.operation.as_deref(), Some("group"));
    assert_eq!(group.input.as_deref(), Some("{{loop_1_output}}"));

    let scatter = output.steps[count - 1].scatter.as_ref().expect("per-group scatter");
    assert_eq!(scatter.input, "{{group_output}}");
    let delivery = scatter
        .actions
        .iter()
        .find(|step| step.kind == StepKind::Action)
        .expect("nested delivery");
    assert_eq!(delivery.params["recipients"]["to"], json!(["{{group.key}}"]));
    assert_eq!(output.estimate.scatter_steps, 1);
    assert!(output.is_valid(), "issues: {:?}", output.validation);
}
