use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BIN: &str = "intentflow";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Binary run from an empty directory with console logging silenced.
fn intentflow(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(BIN).expect("binary should build");
    cmd.current_dir(workdir.path())
        .env("INTENTFLOW_CONSOLE_OUTPUT", "none")
        .env_remove("INTENTFLOW_MAX_CONCURRENCY")
        .env_remove("INTENTFLOW_VALIDATE")
        .env_remove("INTENTFLOW_AUTO_FIX")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_compiler_commands() {
    let workdir = TempDir::new().unwrap();
    intentflow(&workdir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("COMPILER COMMANDS:"))
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("explain"));
}

#[test]
fn compile_prints_grouped_workflow_as_json() {
    let workdir = TempDir::new().unwrap();
    let output = intentflow(&workdir)
        .arg("compile")
        .arg(fixture("ir_grouped_sales.json"))
        .arg("--registry")
        .arg(fixture("registry_v1.json"))
        .output()
        .expect("should run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(parsed["rule"], "grouped_delivery");
    let ids: Vec<&str> = parsed["steps"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|step| step["step_id"].as_str())
        .collect();
    assert_eq!(ids, vec!["read", "filter_1", "group", "scatter_deliver"]);
    assert_eq!(parsed["validation"]["valid"], true);
    assert!(String::from_utf8_lossy(&output.stdout).contains("{{group.key}}"));
}

#[test]
fn compile_writes_yaml_steps_to_a_file() {
    let workdir = TempDir::new().unwrap();
    let target = workdir.path().join("workflow.yaml");
    intentflow(&workdir)
        .arg("compile")
        .arg(fixture("ir_email_triage.yaml"))
        .arg("--registry")
        .arg(fixture("registry_v1.json"))
        .args(["--format", "yaml", "--steps-only", "--output"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let text = std::fs::read_to_string(&target).unwrap();
    let steps: Vec<serde_yaml::Value> = serde_yaml::from_str(&text).expect("YAML step list");
    assert_eq!(steps.len(), 6);
    assert!(text.contains("step_id: flatten_1"));
}

#[test]
fn compile_fails_on_unknown_delivery_method() {
    let workdir = TempDir::new().unwrap();
    let ir = workdir.path().join("ir.json");
    std::fs::write(
        &ir,
        r#"{"data_sources": [{"id": "s", "type": "database", "source": "orders", "location": "orders"}],
            "delivery": [{"id": "d", "method": "carrier_pigeon"}]}"#,
    )
    .unwrap();
    intentflow(&workdir)
        .arg("compile")
        .arg(&ir)
        .arg("--registry")
        .arg(fixture("registry_v1.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("carrier_pigeon"));
}

#[test]
fn validate_reports_fixable_issues_without_fix() {
    let workdir = TempDir::new().unwrap();
    intentflow(&workdir)
        .arg("validate")
        .arg(fixture("workflow_needs_fix.json"))
        .arg("--registry")
        .arg(fixture("registry_v1.json"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("TRANSFORM_BEFORE_ACTION"))
        .stdout(predicate::str::contains("MISSING_DEPENDENCIES"));
}

#[test]
fn validate_with_fix_repairs_the_workflow() {
    let workdir = TempDir::new().unwrap();
    let output = intentflow(&workdir)
        .arg("validate")
        .arg(fixture("workflow_needs_fix.json"))
        .arg("--registry")
        .arg(fixture("registry_v1.json"))
        .arg("--fix")
        .output()
        .expect("should run");
    assert!(output.status.success(), "stdout: {}", String::from_utf8_lossy(&output.stdout));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], true);
    assert_eq!(report["applied_fixes"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["workflow"].as_array().map(Vec::len), Some(3));
}

#[test]
fn explain_shows_rule_candidates() {
    let workdir = TempDir::new().unwrap();
    let output = intentflow(&workdir)
        .arg("explain")
        .arg(fixture("ir_email_triage.yaml"))
        .output()
        .expect("should run");
    assert!(output.status.success());

    let explanation: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(explanation["selected"], "api_loops");
    assert_eq!(explanation["candidates"].as_array().map(Vec::len), Some(4));
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let workdir = TempDir::new().unwrap();
    intentflow(&workdir)
        .args(["--config", "does-not-exist.toml", "explain"])
        .arg(fixture("ir_email_triage.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn config_file_in_working_directory_is_picked_up() {
    let workdir = TempDir::new().unwrap();
    std::fs::write(
        workdir.path().join("intentflow.toml"),
        "[compiler]\ndefault_max_concurrency = 9\n",
    )
    .unwrap();
    let output = intentflow(&workdir)
        .arg("compile")
        .arg(fixture("ir_grouped_sales.json"))
        .arg("--registry")
        .arg(fixture("registry_v1.json"))
        .arg("--steps-only")
        .output()
        .expect("should run");
    assert!(output.status.success());

    let steps: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(steps[3]["config"]["maxConcurrency"], 9);
}
