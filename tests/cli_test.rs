//! Integration tests for the command-line interface.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/web_service.yaml")
}

fn write_template(content: &str) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("service.yaml");
    fs::write(&path, content).unwrap();
    (temp, path)
}

fn tosca_model() -> Command {
    let mut cmd = Command::new(cargo_bin("tosca-model"));
    cmd.env_remove("TOSCA_MODEL_INPUTS").env_remove("RUST_LOG");
    cmd
}

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tosca_model();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("service template models"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tosca_model();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_instantiate_prints_service_json() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tosca_model();
    cmd.arg("instantiate")
        .arg(fixture())
        .args(["--input", "db_password=s3cret", "--format", "json", "--strict"]);
    let output = cmd.assert().success().get_output().stdout.clone();

    let report: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(report["service"]["nodes"]["web_2"]["template_name"], "web");
    assert_eq!(
        report["service"]["nodes"]["web_1"]["outbound_relationships"][0]["target_node_id"],
        "db_1"
    );
    assert_eq!(report["issues"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[test]
fn cli_instantiate_reads_inputs_file() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let inputs = temp.path().join("inputs.yaml");
    fs::write(&inputs, "db_password: from-file\nhttp_port: 9000\n")?;

    let mut cmd = tosca_model();
    cmd.arg("instantiate")
        .arg(fixture())
        .arg("--inputs-file")
        .arg(&inputs)
        .args(["--input", "http_port=9090", "--no-color"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"from-file\""))
        .stdout(predicate::str::contains("9090"))
        .stdout(predicate::str::contains("Found").not());
    Ok(())
}

#[test]
fn cli_validate_reports_missing_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tosca_model();
    cmd.args(["validate", "--no-color"]).arg(fixture());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[field] required input \"db_password\" has no value"))
        .stdout(predicate::str::contains("Found 1 issue(s)"));
    Ok(())
}

#[test]
fn cli_validate_strict_fails_on_issues() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp, path) = write_template(
        "topology_template:\n  node_templates:\n    vm: { type: Missing }\n",
    );
    let mut cmd = tosca_model();
    cmd.args(["validate", "--strict", "--no-color"]).arg(&path);
    cmd.assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("[between types]"));
    Ok(())
}

#[test]
fn cli_validate_clean_template() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp, path) =
        write_template("node_types:\n  Compute: {}\ntopology_template:\n  node_templates:\n    vm: { type: Compute }\n");
    let mut cmd = tosca_model();
    cmd.args(["validate", "--strict"]).arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No issues found"));
    Ok(())
}

#[test]
fn cli_missing_template_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tosca_model();
    cmd.args(["validate", "/nonexistent/service.yaml"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Service template not found"));
    Ok(())
}

#[test]
fn cli_rejects_malformed_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tosca_model();
    cmd.arg("instantiate").arg(fixture()).args(["--input", "no-equals-sign"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input 'no-equals-sign'"));
    Ok(())
}

#[test]
fn cli_types_prints_tree() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tosca_model();
    cmd.arg("types").arg(fixture());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "node_types:\n  tosca.nodes.Root\n    tosca.nodes.Database\n    tosca.nodes.WebApplication\n",
        ))
        .stdout(predicate::str::contains("aria.Plugin (plugin)"));
    Ok(())
}

#[test]
fn cli_debug_logs_to_stderr() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = tosca_model();
    cmd.args(["types", "--debug"]).arg(fixture());
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("DEBUG"))
        .stdout(predicate::str::contains("DEBUG").not());
    Ok(())
}
