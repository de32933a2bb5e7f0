//! Smoke tests for comprobador CLI
//!
//! None of these launch a browser.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the comprobador binary
fn comprobador() -> Command {
    Command::cargo_bin("comprobador").expect("comprobador binary should exist")
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    comprobador()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    comprobador()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("fixtures"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_no_args_shows_help() {
    comprobador().assert().failure(); // Requires a subcommand
}

#[test]
fn test_run_help_lists_overrides() {
    comprobador()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--base-url"))
        .stdout(predicate::str::contains("--headed"))
        .stdout(predicate::str::contains("--step-timeout"));
}

// ============================================================================
// Init / Check
// ============================================================================

#[test]
fn test_init_writes_valid_scenario() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("comprobar.yaml");

    comprobador()
        .args(["--color", "never", "init"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let yaml = fs::read_to_string(&path).unwrap();
    assert!(yaml.contains("admin_dashboard"));
    assert!(yaml.contains("#productTableBody tr"));

    comprobador()
        .args(["--color", "never", "check"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("2 fixture(s), 8 step(s)"));
}

#[test]
fn test_init_does_not_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("comprobar.yaml");
    fs::write(&path, "name: mine\n").unwrap();

    comprobador()
        .arg("init")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "name: mine\n");
}

#[test]
fn test_check_rejects_malformed_yaml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.yaml");
    fs::write(&path, "steps: [ {action: teleport} ]\n").unwrap();

    comprobador()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_check_missing_file() {
    comprobador()
        .args(["check", "does-not-exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.yaml"));
}

// ============================================================================
// Fixtures
// ============================================================================

#[test]
fn test_fixtures_prints_rendered_modules() {
    comprobador()
        .args(["--color", "never", "fixtures"])
        .assert()
        .success()
        .stdout(predicate::str::contains("export const AuthService"))
        .stdout(predicate::str::contains("export const DBService"))
        .stdout(predicate::str::contains("**/js/services/db.js"));
}

#[test]
fn test_fixtures_single_name() {
    comprobador()
        .args(["--color", "never", "fixtures", "--name", "catalog"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Auto ID Product"))
        .stdout(predicate::str::contains("export const AuthService").not());
}

// ============================================================================
// Run (rejected before any browser starts)
// ============================================================================

#[test]
fn test_run_rejects_zero_timeout() {
    comprobador()
        .args(["run", "--step-timeout", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_run_rejects_navigation_shorter_than_settle() {
    comprobador()
        .args(["run", "--navigation-timeout", "200"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("settle_ms"));
}
