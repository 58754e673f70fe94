use intentflow::core::config::ValidatorSettings;
use intentflow::core::registry::PluginRegistry;
use intentflow::core::validator::{Severity, ValidationIssue, WorkflowValidator};
use intentflow::types::WorkflowStep;
use serde_json::json;
use std::path::Path;

fn steps(value: serde_json::Value) -> Vec<WorkflowStep> {
    serde_json::from_value(value).expect("valid workflow")
}

fn report_only() -> ValidatorSettings {
    ValidatorSettings {
        auto_fix: false,
        detect_cycles: false,
    }
}

fn codes(issues: &[ValidationIssue]) -> Vec<&str> {
    issues.iter().map(|issue| issue.code.as_str()).collect()
}

#[test]
fn map_expression_treating_item_as_array_is_rejected() {
    let workflow = steps(json!([{
        "step_id": "keep_non_empty",
        "type": "transform",
        "operation": "map",
        "input": "{{input}}",
        "config": {"expression": "item.length > 0 ? [item] : []"},
        "dependencies": []
    }]));
    let issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    assert_eq!(codes(&issues), vec!["INVALID_MAP_LOGIC", "MAP_RETURNS_ARRAY"]);
    assert_eq!(issues[0].severity, Severity::Error);
    assert_eq!(issues[1].severity, Severity::Warning);
}

#[test]
fn action_with_embedded_expression_is_fixable() {
    let workflow = steps(json!([{
        "step_id": "notify",
        "type": "action",
        "plugin": "gmail",
        "action": "send_email",
        "params": {"recipients": {"expression": "rows.map(r => r.email)"}},
        "dependencies": []
    }]));
    let issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    let issue = issues
        .iter()
        .find(|issue| issue.code == "TRANSFORM_BEFORE_ACTION")
        .expect("embedded transform reported");
    assert!(issue.auto_fixable);
    assert_eq!(issue.severity, Severity::Error);
}

#[test]
fn unknown_step_type_is_reported_with_the_raw_value() {
    let workflow = steps(json!([
        {"step_id": "s1", "type": "ai_call", "input": "{{input}}", "dependencies": []}
    ]));
    let issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    assert_eq!(codes(&issues), vec!["INVALID_STEP_TYPE"]);
    assert!(issues[0].message.contains("ai_call"));
}

#[test]
fn references_resolve_only_to_prior_steps_in_scope() {
    let workflow = steps(json!([
        {"step_id": "early", "type": "ai_processing", "input": "{{late_output}}", "dependencies": []},
        {"step_id": "late", "type": "ai_processing", "input": "{{input}}", "output_variable": "late_output", "dependencies": []},
        {"step_id": "ghost", "type": "ai_processing", "input": "{{nowhere.field}}", "dependencies": []},
        {"step_id": "expr", "type": "ai_processing", "input": "{{CONCAT(a, b)}} {{x IS NULL}}", "dependencies": []},
        {"step_id": "env", "type": "ai_processing", "input": "{{env.API_KEY}} {{workflow.name}} {{execution.id}}", "dependencies": []}
    ]));
    let issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    let unresolved: Vec<&str> = issues
        .iter()
        .filter(|issue| issue.code == "UNRESOLVED_VARIABLE")
        .map(|issue| issue.step_id.as_str())
        .collect();
    assert_eq!(unresolved, vec!["early", "ghost"]);
    let early = issues.iter().find(|issue| issue.step_id == "early").unwrap();
    assert!(early.suggestion.as_deref().unwrap_or_default().contains("reorder"));
}

#[test]
fn scatter_without_item_variable_infers_one_and_warns() {
    let workflow = steps(json!([
        {"step_id": "read", "type": "action", "plugin": "gmail", "action": "list_messages", "output_variable": "read_output", "dependencies": []},
        {
            "step_id": "fan_out",
            "type": "scatter_gather",
            "config": {
                "input": "{{read_output}}",
                "actions": [
                    {"step_id": "summarize", "type": "ai_processing", "input": "{{message.body}} {{message.subject}}", "dependencies": []}
                ]
            },
            "dependencies": ["read"]
        }
    ]));
    let issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    assert_eq!(codes(&issues), vec!["MISSING_ITERATOR_VARIABLE"]);
    assert!(issues[0]
        .suggestion
        .as_deref()
        .unwrap_or_default()
        .contains("'message'"));
}

#[test]
fn dependency_problems_are_classified() {
    let workflow = steps(json!([
        {"step_id": "a", "type": "ai_processing", "input": "{{input}}", "dependencies": ["b"]},
        {"step_id": "b", "type": "ai_processing", "input": "{{input}}", "dependencies": ["missing"]},
        {"step_id": "c", "type": "ai_processing", "input": "{{input}}"}
    ]));
    let issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    assert_eq!(
        codes(&issues),
        vec!["MISSING_DEPENDENCIES", "UNKNOWN_DEPENDENCY", "FORWARD_DEPENDENCY"]
    );
    assert_eq!(issues[0].step_id, "c");
    assert_eq!(issues[1].step_id, "b");
    assert_eq!(issues[2].step_id, "a");
}

#[test]
fn cycles_are_reported_only_when_enabled() {
    let workflow = steps(json!([
        {"step_id": "a", "type": "ai_processing", "input": "{{input}}", "dependencies": ["b"]},
        {"step_id": "b", "type": "ai_processing", "input": "{{input}}", "dependencies": ["a"]}
    ]));
    let default_issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    assert!(!default_issues.iter().any(|issue| issue.code == "DEPENDENCY_CYCLE"));

    let settings = ValidatorSettings {
        auto_fix: false,
        detect_cycles: true,
    };
    let issues = WorkflowValidator::new(None, settings).run(&workflow);
    let cycle = issues
        .iter()
        .find(|issue| issue.code == "DEPENDENCY_CYCLE")
        .expect("cycle reported");
    assert_eq!(cycle.step_id, "a");
    assert!(cycle.message.contains("a -> b"));
}

#[test]
fn duplicate_ids_and_missing_structure_are_errors() {
    let workflow = steps(json!([
        {"step_id": "dup", "type": "transform", "operation": "sort", "dependencies": []},
        {"step_id": "dup", "type": "conditional", "input": "{{input}}", "dependencies": []}
    ]));
    let issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    let found = codes(&issues);
    assert!(found.contains(&"DUPLICATE_STEP_ID"));
    assert!(found.contains(&"MISSING_TRANSFORM_INPUT"));
    assert!(found.contains(&"MISSING_CONDITION"));
    assert!(issues.iter().all(|issue| issue.severity == Severity::Error));
}

#[test]
fn registry_checks_plugins_actions_and_required_params() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/registry_v1.json");
    let registry = PluginRegistry::load_from_file(&path).unwrap();
    let workflow = steps(json!([
        {"step_id": "a", "type": "action", "plugin": "outlook", "action": "send", "dependencies": []},
        {"step_id": "b", "type": "action", "plugin": "gmail", "action": "send", "dependencies": []},
        {"step_id": "c", "type": "action", "plugin": "gmail", "action": "send_email", "params": {"content": {"body": "hi"}}, "dependencies": []}
    ]));

    let issues = WorkflowValidator::new(Some(&registry), report_only()).run(&workflow);
    assert_eq!(
        codes(&issues),
        vec!["MISSING_REQUIRED_PARAM", "UNKNOWN_ACTION", "UNKNOWN_PLUGIN"]
    );
    assert!(issues[0].message.contains("recipients"));

    let without_registry = WorkflowValidator::new(None, report_only()).run(&workflow);
    assert!(without_registry.is_empty());
}

#[test]
fn issues_sort_errors_first_then_code_then_step() {
    let workflow = steps(json!([
        {"step_id": "z", "type": "bogus", "dependencies": []},
        {
            "step_id": "fan",
            "type": "scatter_gather",
            "config": {"input": "{{input}}", "actions": []},
            "dependencies": []
        },
        {"step_id": "a", "type": "bogus", "dependencies": []}
    ]));
    let issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    let ordered: Vec<(String, &str)> = issues
        .iter()
        .map(|issue| (issue.code.clone(), issue.step_id.as_str()))
        .collect();
    assert_eq!(
        ordered,
        vec![
            ("INVALID_STEP_TYPE".to_string(), "a"),
            ("INVALID_STEP_TYPE".to_string(), "z"),
            ("MISSING_ITERATOR_VARIABLE".to_string(), "fan"),
        ]
    );
}

#[test]
fn nested_steps_under_config_are_checked_in_their_own_scope() {
    let workflow = steps(json!([
        {"step_id": "read", "type": "action", "plugin": "gmail", "action": "list_messages", "output_variable": "read_output", "dependencies": []},
        {
            "step_id": "scatter_1",
            "type": "scatter_gather",
            "config": {
                "input": "{{read_output}}",
                "itemVariable": "email",
                "actions": [
                    {"step_id": "notify", "type": "action", "plugin": "slack", "action": "post_message", "params": {"channel": {"expression": "email.owner"}}, "dependencies": []},
                    {"step_id": "guess", "type": "ai_call", "input": "{{nowhere}}", "dependencies": []}
                ]
            },
            "dependencies": ["read"]
        },
        {
            "step_id": "branch",
            "type": "conditional",
            "condition": {"type": "simple", "field": "status", "operator": "==", "value": "open"},
            "config": {
                "then_steps": [
                    {"step_id": "keep", "type": "transform", "operation": "map", "input": "{{input}}", "config": {"expression": "item.length > 0 ? [item] : []"}, "dependencies": []}
                ]
            },
            "dependencies": ["scatter_1"]
        }
    ]));
    let issues = WorkflowValidator::new(None, report_only()).run(&workflow);
    let located: Vec<(&str, &str)> = issues
        .iter()
        .map(|issue| (issue.step_id.as_str(), issue.code.as_str()))
        .collect();
    assert_eq!(
        located,
        vec![
            ("keep", "INVALID_MAP_LOGIC"),
            ("guess", "INVALID_STEP_TYPE"),
            ("notify", "TRANSFORM_BEFORE_ACTION"),
            ("guess", "UNRESOLVED_VARIABLE"),
            ("keep", "MAP_RETURNS_ARRAY"),
        ]
    );
}
