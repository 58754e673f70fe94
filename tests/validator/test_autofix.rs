use intentflow::core::config::ValidatorSettings;
use intentflow::core::registry::PluginRegistry;
use intentflow::core::validator::WorkflowValidator;
use intentflow::types::{StepKind, WorkflowStep};
use serde_json::json;
use std::path::Path;

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn fixing() -> ValidatorSettings {
    ValidatorSettings {
        auto_fix: true,
        detect_cycles: false,
    }
}

fn report_only() -> ValidatorSettings {
    ValidatorSettings {
        auto_fix: false,
        detect_cycles: false,
    }
}

fn embedded_recipients() -> Vec<WorkflowStep> {
    serde_json::from_value(json!([
        {
            "step_id": "read",
            "type": "action",
            "plugin": "google-sheets",
            "action": "read_range",
            "params": {"spreadsheet_id": "sheet-1", "range": "A:Z"},
            "output_variable": "read_output",
            "dependencies": []
        },
        {
            "step_id": "notify",
            "type": "action",
            "plugin": "gmail",
            "action": "send_email",
            "input": "{{read_output}}",
            "params": {
                "recipients": {"expression": "read_output.map(r => r.owner_email)"},
                "content": {"subject": "Weekly", "body": "{{read_output}}"}
            },
            "dependencies": ["read"]
        }
    ]))
    .expect("valid workflow")
}

#[test]
fn embedded_expression_is_lifted_into_a_preceding_map() {
    let registry = PluginRegistry::load_from_file(&fixture("registry_v1.json")).unwrap();
    let validator = WorkflowValidator::new(Some(&registry), fixing());

    let report = validator.validate(&embedded_recipients());
    assert!(report.valid, "issues: {:?}", report.issues);
    assert_eq!(report.applied_fixes.len(), 1);
    assert_eq!(report.applied_fixes[0].code, "TRANSFORM_BEFORE_ACTION");
    assert_eq!(report.applied_fixes[0].step_id, "notify");

    let workflow = &report.workflow;
    assert_eq!(workflow.len(), 3);
    let transform = &workflow[1];
    assert_eq!(transform.kind, StepKind::Transform);
    assert_eq!(transform.operation.as_deref(), Some("map"));
    assert!(transform.step_id.starts_with("step_autofix_"));
    assert_eq!(transform.input.as_deref(), Some("{{read_output}}"));
    assert_eq!(
        transform.config["expression"],
        json!("read_output.map(r => r.owner_email)")
    );
    assert_eq!(transform.dependencies, Some(vec!["read".to_string()]));

    let action = &workflow[2];
    assert_eq!(action.step_id, "notify");
    assert_eq!(
        action.params["recipients"],
        json!(format!("{{{{{}}}}}", transform.step_id))
    );
    assert_eq!(
        action.dependencies,
        Some(vec!["read".to_string(), transform.step_id.clone()])
    );
}

#[test]
fn repaired_workflow_has_nothing_left_to_fix() {
    let validator = WorkflowValidator::new(None, fixing());
    let report = validator.validate(&embedded_recipients());

    let again = WorkflowValidator::new(None, report_only()).validate(&report.workflow);
    assert!(again.valid);
    assert!(again.issues.iter().all(|issue| !issue.auto_fixable));
    assert!(again.applied_fixes.is_empty());
    assert_eq!(again.workflow, report.workflow);
}

#[test]
fn report_only_mode_leaves_the_workflow_untouched() {
    let workflow = embedded_recipients();
    let report = WorkflowValidator::new(None, report_only()).validate(&workflow);
    assert!(!report.valid);
    assert!(report.has_code("TRANSFORM_BEFORE_ACTION"));
    assert!(report.applied_fixes.is_empty());
    assert_eq!(report.workflow, workflow);
}

#[test]
fn fixture_with_missing_dependencies_is_repaired() {
    let text = std::fs::read_to_string(fixture("workflow_needs_fix.json")).unwrap();
    let workflow: Vec<WorkflowStep> = serde_json::from_str(&text).unwrap();
    let registry = PluginRegistry::load_from_file(&fixture("registry_v1.json")).unwrap();

    let before = WorkflowValidator::new(Some(&registry), report_only()).run(&workflow);
    assert!(before.iter().any(|issue| issue.code == "MISSING_DEPENDENCIES"));
    assert!(before.iter().any(|issue| issue.code == "TRANSFORM_BEFORE_ACTION"));

    let report = WorkflowValidator::new(Some(&registry), fixing()).validate(&workflow);
    assert!(report.valid, "issues: {:?}", report.issues);
    let codes: Vec<&str> = report
        .applied_fixes
        .iter()
        .map(|fix| fix.code.as_str())
        .collect();
    assert_eq!(codes, vec!["MISSING_DEPENDENCIES", "TRANSFORM_BEFORE_ACTION"]);
    assert!(report
        .workflow
        .iter()
        .all(|step| step.dependencies.is_some()));
}

#[test]
fn lifted_ids_never_collide_with_existing_steps() {
    let mut workflow: Vec<WorkflowStep> = serde_json::from_value(json!([{
        "step_id": "notify",
        "type": "action",
        "plugin": "slack",
        "action": "send_message",
        "params": {
            "channel": {"expression": "'#' + team"},
            "content": {"condition": {"field": "urgent", "operator": "==", "value": true}}
        },
        "dependencies": []
    }]))
    .unwrap();
    let report = WorkflowValidator::new(None, fixing()).validate(&workflow);
    let lifted: Vec<&str> = report
        .workflow
        .iter()
        .filter(|step| step.kind == StepKind::Transform)
        .map(|step| step.step_id.as_str())
        .collect();
    assert_eq!(lifted.len(), 2);
    assert_ne!(lifted[0], lifted[1]);
    assert_eq!(lifted[1], format!("{}_1", lifted[0]));

    let operations: Vec<&str> = report
        .workflow
        .iter()
        .filter_map(|step| step.operation.as_deref())
        .collect();
    assert_eq!(operations, vec!["map", "filter"]);

    // Ids stay unique when an existing step already carries a generated-looking id.
    workflow.insert(
        0,
        WorkflowStep::new(lifted[0], StepKind::AiProcessing).with_input("{{input}}"),
    );
    let ids_before: Vec<String> = workflow.iter().map(|step| step.step_id.clone()).collect();
    let report = WorkflowValidator::new(None, fixing()).validate(&workflow);
    let mut ids: Vec<&str> = report.workflow.iter().map(|step| step.step_id.as_str()).collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total);
    assert_eq!(total, ids_before.len() + 2);
}
