//! End-to-end CLI tests for the puzzle-solver binary.

#![allow(deprecated)]

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use support::puzzle_server::{FragmentResponder, start_fragment_server};
use tempfile::TempDir;

/// Command with an empty config home so no user config leaks in.
fn solver_cmd(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("puzzle-solver").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    solver_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Solve a fragmented puzzle"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    solver_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("puzzle-solver"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    solver_cmd(&home)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_rejects_invalid_config_file() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "[fetch]\nmax_concurrency = 0\n").unwrap();

    solver_cmd(&home)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("fetch.max_concurrency"));
}

#[tokio::test]
async fn test_binary_solves_and_prints_text() {
    let Some(server) = start_fragment_server().await else {
        return;
    };
    FragmentResponder::new(&["Hello", "world", "test"], 1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    solver_cmd(&home)
        .args(["-q", "--batch-size", "2", "--base-url"])
        .arg(server.uri())
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello world test"))
        .stdout(predicate::str::contains("Status: Complete"));
}

#[tokio::test]
async fn test_binary_json_output() {
    let Some(server) = start_fragment_server().await else {
        return;
    };
    FragmentResponder::new(&["Hello", "world"], 1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let assert = solver_cmd(&home)
        .args(["-q", "--json", "--base-url"])
        .arg(server.uri())
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["text"], "Hello world");
    assert_eq!(value["stats"]["total_found"], 2);
    assert!(value.get("error").is_none());
}

#[tokio::test]
async fn test_binary_exit_code_one_on_empty_result() {
    let Some(server) = start_fragment_server().await else {
        return;
    };
    FragmentResponder::new(&[], 1).mount(&server).await;

    let home = TempDir::new().unwrap();
    let assert = solver_cmd(&home)
        .args(["-q", "--base-url"])
        .arg(server.uri())
        .assert()
        .failure();

    assert_eq!(assert.get_output().status.code(), Some(1));
    assert!(
        String::from_utf8_lossy(&assert.get_output().stdout).contains("Failed to solve puzzle")
    );
}

#[tokio::test]
async fn test_binary_check_flag() {
    let Some(server) = start_fragment_server().await else {
        return;
    };
    FragmentResponder::new(&["Hello"], 1).mount(&server).await;

    let home = TempDir::new().unwrap();
    solver_cmd(&home)
        .args(["-q", "--check", "--base-url"])
        .arg(server.uri())
        .assert()
        .success()
        .stdout(predicate::str::contains("reachable"));
}
