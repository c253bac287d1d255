// Regression tests: the CLI surface stays stable and errors are rendered
// as miette diagnostics with engine codes.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn temp_dataset(name: &str, json: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("sigmastat-{}-{name}", std::process::id()));
    fs::write(&path, json).unwrap();
    path
}

fn series_json() -> String {
    let rows: Vec<String> = (0..30)
        .map(|i| format!("{{\"measure\": {}}}", 50.0 + ((i % 7) as f64 - 3.0) * 0.2))
        .collect();
    format!("[{}]", rows.join(","))
}

#[test]
fn list_tests_names_the_catalog() {
    let mut cmd = Command::cargo_bin("sigmastat").unwrap();
    cmd.arg("list-tests");
    cmd.assert()
        .success()
        .stdout(contains("descriptive_summary").and(contains("capability_normal")));
}

#[test]
fn describe_shows_the_config_schema() {
    let mut cmd = Command::cargo_bin("sigmastat").unwrap();
    cmd.arg("describe").arg("one_sample_t");
    cmd.assert()
        .success()
        .stdout(contains("mu").and(contains("required")));
}

#[test]
fn run_prints_a_validated_result() {
    let dataset = temp_dataset("run.json", &series_json());
    let mut cmd = Command::cargo_bin("sigmastat").unwrap();
    cmd.arg("run")
        .arg(&dataset)
        .arg("--test")
        .arg("one_sample_t")
        .arg("--config")
        .arg("{\"column\": \"measure\", \"mu\": 50.0}");
    cmd.assert()
        .success()
        .stdout(contains("status: ok").and(contains("validation")));
    let _ = fs::remove_file(dataset);
}

#[test]
fn json_format_emits_the_full_document() {
    let dataset = temp_dataset("json.json", &series_json());
    let mut cmd = Command::cargo_bin("sigmastat").unwrap();
    let output = cmd
        .arg("run")
        .arg(&dataset)
        .arg("--test")
        .arg("descriptive_summary")
        .arg("--config")
        .arg("{\"columns\": [\"measure\"]}")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["result"]["success"], serde_json::json!(true));
    assert!(doc["validation"]["passed"].is_boolean());
    let _ = fs::remove_file(dataset);
}

#[test]
fn unknown_test_fails_with_a_diagnostic_code() {
    let dataset = temp_dataset("unknown.json", &series_json());
    let mut cmd = Command::cargo_bin("sigmastat").unwrap();
    cmd.arg("run")
        .arg(&dataset)
        .arg("--test")
        .arg("three_way_anova");
    cmd.assert().failure().stderr(
        contains("sigmastat::request")
            .or(contains("three_way_anova"))
            .or(contains("help:")),
    );
    let _ = fs::remove_file(dataset);
}
