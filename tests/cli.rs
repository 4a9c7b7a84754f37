use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

use tempfile::tempdir;

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("threadpress").expect("Binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("probe")));
}

#[test]
fn run_with_missing_config_fails_before_any_network_call() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("threadpress").expect("Binary exists");
    cmd.current_dir(dir.path())
        .arg("run")
        .arg("--config")
        .arg("/definitely/not/here.yaml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn startup_failure_leaves_an_error_log_in_the_output_dir() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("broken.yaml");
    fs::write(&config, "fetch: [this is not a mapping\n").unwrap();
    let out = dir.path().join("out");

    let mut cmd = Command::cargo_bin("threadpress").expect("Binary exists");
    cmd.current_dir(dir.path())
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config YAML"));

    let logs: Vec<_> = fs::read_dir(&out)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("error_log_"))
        .collect();
    assert_eq!(logs.len(), 1);
    let content = fs::read_to_string(logs[0].path()).unwrap();
    assert!(content.starts_with("Error: Failed to parse config YAML"));
}

#[test]
fn unknown_variant_is_rejected_by_the_parser() {
    let mut cmd = Command::cargo_bin("threadpress").expect("Binary exists");
    cmd.args(["run", "--variant", "deluxe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("deluxe"));
}

#[test]
fn probe_without_credential_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("threadpress").expect("Binary exists");
    cmd.current_dir(dir.path())
        .env_remove("OPENAI_API_KEY")
        .arg("probe")
        .assert()
        .failure()
        .stderr(predicate::str::contains("probe failed"));
}
