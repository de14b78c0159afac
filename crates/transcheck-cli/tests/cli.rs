//! End-to-end CLI tests using `assert_cmd`
//!
//! None of these reach a browser: every `run` invocation fails or finishes
//! before Chromium would be launched.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ENV_OVERRIDES: [&str; 8] = [
    "TRANSCHECK_SITE_URL",
    "TRANSCHECK_POLL_INTERVAL_MS",
    "TRANSCHECK_CONVERGENCE_TIMEOUT_MS",
    "TRANSCHECK_SETTLE_DELAY_MS",
    "TRANSCHECK_INTER_CASE_DELAY_MS",
    "TRANSCHECK_KEYSTROKE_DELAY_MS",
    "TRANSCHECK_PARALLELISM",
    "TRANSCHECK_HEADLESS",
];

/// Binary with a clean environment
fn cargo_bin() -> Command {
    let mut command =
        Command::cargo_bin("transcheck").unwrap_or_else(|err| panic!("Binary not found: {err}"));
    for key in ENV_OVERRIDES {
        command.env_remove(key);
    }
    command
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap_or_else(|err| panic!("Failed to create temp dir: {err}"))
}

#[test]
fn test_help_lists_subcommands() {
    cargo_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_list_builtin_fixtures() {
    cargo_bin()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pos_Fun_0002"))
        .stdout(predicate::str::contains("Pos_UI_001"))
        .stdout(predicate::str::is_match(r"Neg_Fun_0006 .*\[needs review\]").unwrap());
}

#[test]
fn test_list_single_suite() {
    cargo_bin()
        .args(["list", "--suite", "incremental"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pos_UI_001"))
        .stdout(predicate::str::contains("Pos_Fun_0002").not());
}

#[test]
fn test_list_fixture_directory() {
    let temp = temp_dir();
    fs::write(
        temp.path().join("extra.json"),
        r#"{"positive": [{
            "id": "Pos_Local_0001",
            "label": "Local greeting",
            "input": "suba udhaeesanak",
            "expected": "සුබ උදෑසනක්",
            "category": "Greetings",
            "grammar_class": "Simple sentence",
            "length_class": "S"
        }]}"#,
    )
    .unwrap();

    cargo_bin()
        .args(["list", "--fixtures"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Pos_Local_0001"))
        .stdout(predicate::str::contains("Pos_Fun_0002").not());
}

#[test]
fn test_config_prints_defaults() {
    cargo_bin()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[timing]"))
        .stdout(predicate::str::contains("poll_interval_ms = 100"))
        .stdout(predicate::str::contains("settle_delay_ms = 3000"));
}

#[test]
fn test_config_file_and_environment_layers() {
    let temp = temp_dir();
    let path = temp.path().join("transcheck.toml");
    fs::write(&path, "[timing]\nsettle_delay_ms = 1200\npoll_interval_ms = 50\n").unwrap();

    cargo_bin()
        .args(["config", "--config"])
        .arg(&path)
        .env("TRANSCHECK_POLL_INTERVAL_MS", "75")
        .assert()
        .success()
        .stdout(predicate::str::contains("settle_delay_ms = 1200"))
        .stdout(predicate::str::contains("poll_interval_ms = 75"));
}

#[test]
fn test_unknown_config_key_fails_setup() {
    let temp = temp_dir();
    let path = temp.path().join("bad.toml");
    fs::write(&path, "[timing]\nsettle_seconds = 3\n").unwrap();

    cargo_bin()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .code(2);
}

#[test]
fn test_invalid_parallelism_fails_setup() {
    cargo_bin()
        .args(["run", "--parallelism", "0"])
        .assert()
        .code(2);
}

#[test]
fn test_empty_fixture_directory_fails_setup() {
    let temp = temp_dir();
    cargo_bin()
        .args(["run", "--fixtures"])
        .arg(temp.path())
        .assert()
        .code(2);
}

#[test]
fn test_filter_without_matches_runs_nothing() {
    cargo_bin()
        .args(["run", "--filter", "No_Such_Case"])
        .assert()
        .success();
}
