use intentflow::core::compiler::{CompileContext, CompileEstimate, CompilerRule, RuleSelector};
use intentflow::core::config::IntentflowConfig;
use intentflow::core::error::AppError;
use intentflow::core::registry::PluginRegistry;
use intentflow::core::Compiler;
use intentflow::types::{IntentIr, WorkflowStep};
use serde_json::json;

fn ir(value: serde_json::Value) -> IntentIr {
    serde_json::from_value(value).expect("valid IR")
}

fn selected(ir: &IntentIr) -> Option<&'static str> {
    RuleSelector::new().select(ir).map(|rule| rule.name())
}

#[test]
fn builtin_rules_evaluate_in_priority_order() {
    let selector = RuleSelector::new();
    let order: Vec<String> = selector
        .rules()
        .map(|rule| format!("{}:{}", rule.name(), rule.priority()))
        .collect();
    insta::assert_snapshot!(
        order.join(" "),
        @"grouped_delivery:300 api_loops:200 simple_linear:100 general_pipeline:10"
    );
}

#[test]
fn grouped_tabular_ir_selects_grouped_delivery() {
    let ir = ir(json!({
        "data_sources": [{"id": "s", "type": "tabular", "source": "sheets", "location": "x"}],
        "grouping": {"group_by": "owner", "emit_per_group": true},
        "delivery": [{"id": "d", "method": "email", "config": {"to": "a@x.com"}}]
    }));
    assert_eq!(selected(&ir), Some("grouped_delivery"));
}

#[test]
fn partitions_alone_enable_grouped_delivery() {
    let ir = ir(json!({
        "data_sources": [{"id": "s", "type": "tabular", "source": "sheets", "location": "x"}],
        "partitions": [{"field": "region"}],
        "delivery": [{"id": "d", "method": "slack", "config": {"channel": "#ops"}}]
    }));
    assert_eq!(selected(&ir), Some("grouped_delivery"));
}

#[test]
fn grouping_without_per_group_emission_falls_to_general() {
    let ir = ir(json!({
        "data_sources": [{"id": "s", "type": "tabular", "source": "sheets", "location": "x"}],
        "grouping": {"group_by": "owner", "emit_per_group": false},
        "delivery": [{"id": "d", "method": "email", "config": {"to": "a@x.com"}}]
    }));
    assert_eq!(selected(&ir), Some("general_pipeline"));
}

#[test]
fn api_source_with_loop_selects_api_loops() {
    let ir = ir(json!({
        "data_sources": [{"id": "s", "type": "api", "source": "gmail", "location": "inbox"}],
        "ai_operations": [{"id": "ai", "type": "summarize", "instruction": "Summarize"}],
        "loops": [{"id": "l", "for_each": "{{read_output}}", "item_variable": "email"}],
        "delivery": [{"id": "d", "method": "email", "config": {"to": "a@x.com"}}]
    }));
    assert_eq!(selected(&ir), Some("api_loops"));
}

#[test]
fn api_loops_with_branches_or_grouping_fall_to_general() {
    let registry = PluginRegistry::load_from_file(
        &std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/registry_v1.json"),
    )
    .expect("fixture registry loads");
    let config = IntentflowConfig::default();
    let ir = ir(json!({
        "data_sources": [{"id": "s", "type": "api", "source": "gmail", "location": "inbox"}],
        "ai_operations": [{"id": "ai", "type": "summarize", "instruction": "Summarize"}],
        "loops": [{"id": "l", "for_each": "{{read_output}}", "item_variable": "email", "do": ["ai"]}],
        "conditionals": [{
            "when": {"type": "simple", "field": "urgent", "operator": "equals", "value": true},
            "then": [{"type": "delivery", "method": "slack", "config": {"channel": "#urgent"}}]
        }],
        "grouping": {"group_by": "sender", "emit_per_group": false},
        "delivery": [{"id": "d", "method": "email", "config": {"to": "a@x.com"}}]
    }));
    assert_eq!(selected(&ir), Some("general_pipeline"));

    let output = Compiler::new(&registry, &config).compile(&ir).unwrap();
    assert_eq!(output.rule, "general_pipeline");
    let kinds: Vec<String> = output
        .steps
        .iter()
        .map(|step| format!("{}:{}", step.kind, step.operation.as_deref().unwrap_or("-")))
        .collect();
    assert!(kinds.contains(&"transform:group".to_string()), "steps: {:?}", kinds);
    assert!(kinds.contains(&"loop:-".to_string()), "steps: {:?}", kinds);
    assert!(kinds.contains(&"conditional:-".to_string()), "steps: {:?}", kinds);

    let mut without_branches = ir.clone();
    without_branches.conditionals.clear();
    without_branches.grouping = None;
    assert_eq!(selected(&without_branches), Some("api_loops"));
}

#[test]
fn plain_pipeline_selects_simple_linear() {
    let ir = ir(json!({
        "data_sources": [{"id": "s", "type": "database", "source": "orders", "location": "orders"}],
        "filters": [{"id": "f", "field": "total", "operator": ">", "value": 100}],
        "delivery": [{"id": "d", "method": "file", "config": {"path": "out.csv"}}]
    }));
    assert_eq!(selected(&ir), Some("simple_linear"));
}

#[test]
fn branching_pipeline_falls_back_to_general() {
    let ir = ir(json!({
        "data_sources": [{"id": "s", "type": "file", "source": "export", "location": "rows.json"}],
        "conditionals": [{
            "when": {"type": "simple", "field": "status", "operator": "equals", "value": "late"},
            "then": [{"type": "delivery", "method": "slack", "config": {"channel": "#late"}}]
        }],
        "delivery": [{"id": "d", "method": "email", "config": {"to": "a@x.com"}}]
    }));
    assert_eq!(selected(&ir), Some("general_pipeline"));
}

#[test]
fn selection_is_total_for_every_ir_with_a_source() {
    let sources = ["tabular", "api", "webhook", "database", "file", "stream"];
    for source in sources {
        let ir = ir(json!({
            "data_sources": [{"id": "s", "type": source, "source": "x", "location": "y"}],
            "delivery": [{"id": "d", "method": "webhook", "config": {"url": "https://hook"}}]
        }));
        assert!(selected(&ir).is_some(), "no rule for {}", source);
        assert_eq!(selected(&ir), selected(&ir));
    }
}

#[test]
fn ir_without_sources_is_an_unsupported_pattern() {
    let registry = PluginRegistry::new();
    let config = IntentflowConfig::default();
    let compiler = Compiler::new(&registry, &config);
    let ir = ir(json!({"delivery": [{"id": "d", "method": "email"}]}));

    let err = compiler.compile(&ir).unwrap_err();
    assert_eq!(err.code, "IFC-RULE-001");

    let explanation = compiler.explain(&ir);
    assert!(explanation.selected.is_none());
    assert!(explanation.candidates.iter().all(|candidate| !candidate.supports));
    assert!(explanation.issues.iter().any(|issue| issue.code == "NO_DATA_SOURCE"));
}

struct AlwaysRule;

impl CompilerRule for AlwaysRule {
    fn name(&self) -> &'static str {
        "always"
    }

    fn priority(&self) -> u32 {
        1000
    }

    fn description(&self) -> &'static str {
        "Matches everything"
    }

    fn supports(&self, _ir: &IntentIr) -> bool {
        true
    }

    fn compile(&self, _ctx: &mut CompileContext<'_>) -> Result<Vec<WorkflowStep>, AppError> {
        Ok(Vec::new())
    }

    fn estimate(&self, _ir: &IntentIr) -> CompileEstimate {
        CompileEstimate::default()
    }
}

#[test]
fn registered_rules_take_part_in_priority_order() {
    let selector = RuleSelector::new().with_rule(Box::new(AlwaysRule));
    assert_eq!(selector.rules().next().map(|rule| rule.name()), Some("always"));
    assert_eq!(selector.select(&IntentIr::default()).map(|rule| rule.name()), Some("always"));
}

#[test]
fn explain_reports_selected_rule_and_estimate() {
    let registry = PluginRegistry::new();
    let config = IntentflowConfig::default();
    let ir = ir(json!({
        "data_sources": [{"id": "s", "type": "tabular", "source": "sheets", "location": "x"}],
        "filters": [{"id": "f", "field": "stage", "operator": "equals", "value": "4"}],
        "grouping": {"group_by": "sales_person", "emit_per_group": true},
        "delivery": [{"id": "d", "method": "email", "config": {"recipient_source": "{{sales_person}}"}}]
    }));
    let explanation = Compiler::new(&registry, &config).explain(&ir);
    assert_eq!(explanation.selected.as_deref(), Some("grouped_delivery"));
    assert_eq!(explanation.candidates.len(), 4);
    let estimate = explanation.estimate.expect("estimate for selected rule");
    assert_eq!(estimate.scatter_steps, 1);
    assert_eq!(estimate.ai_steps, 0);
    assert!(explanation.issues.is_empty());
}
