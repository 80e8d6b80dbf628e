//! Smoke tests -- verify the binary runs and key subcommands work.

use assert_cmd::Command;
use predicates::str::contains;

fn cli(log: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("scenariorunner").unwrap();
    cmd.env_remove("SCENARIORUNNER_CONFIG")
        .arg("--log")
        .arg(log);
    cmd
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("scenariorunner")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Synthetic-user scenario runner"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("scenariorunner")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("scenariorunner"));
}

#[test]
fn test_list_shows_builtin_scenarios() {
    let dir = tempfile::TempDir::new().unwrap();
    cli(&dir.path().join("log.jsonl"))
        .arg("list")
        .assert()
        .success()
        .stdout(contains("single_extraction"))
        .stdout(contains("enrichment_pipeline"))
        .stdout(contains("extraction_evaluation"));
}

#[test]
fn test_validate_missing_log_is_not_an_error() {
    let dir = tempfile::TempDir::new().unwrap();
    cli(&dir.path().join("absent.jsonl"))
        .args(["validate", "--json"])
        .assert()
        .success()
        .stdout(contains("\"total_records\": 0"));
}

#[test]
fn test_unknown_scenario_fails_without_logging_steps() {
    let dir = tempfile::TempDir::new().unwrap();
    let log = dir.path().join("log.jsonl");
    cli(&log)
        .args(["run", "ghost", "--no-preamble"])
        .assert()
        .failure()
        .stderr(contains("unknown scenario 'ghost'"));

    let content = std::fs::read_to_string(&log).unwrap_or_default();
    assert!(content.is_empty());
}

#[test]
fn test_unknown_scenario_skips_preamble() {
    let dir = tempfile::TempDir::new().unwrap();
    let log = dir.path().join("log.jsonl");
    cli(&log)
        .args(["run", "ghost"])
        .assert()
        .failure()
        .stderr(contains("unknown scenario 'ghost'"));

    let content = std::fs::read_to_string(&log).unwrap_or_default();
    assert!(content.is_empty(), "log should be empty, got: {}", content);
}

#[test]
fn test_log_architecture_then_clear() {
    let dir = tempfile::TempDir::new().unwrap();
    let log = dir.path().join("log.jsonl");

    cli(&log)
        .arg("log-architecture")
        .assert()
        .success()
        .stdout(contains("Logged 2 architecture records"));
    assert!(log.exists());

    cli(&log)
        .arg("clear-log")
        .assert()
        .success()
        .stdout(contains("Cleared log file"));
    assert!(!log.exists());
}
