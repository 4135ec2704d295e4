// ============================================================================
// File: tests/cli.rs
// ----------------------------------------------------------------------------
// Binary surface smoke tests. Nothing here needs a container runtime or
// ansible on the host.
// ============================================================================

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_run_command() {
    Command::cargo_bin("playpen")
        .expect("binary not built")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("--env-file"));
}

#[test]
fn run_help_documents_the_switches() {
    Command::cargo_bin("playpen")
        .expect("binary not built")
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--skip-target"))
        .stdout(predicate::str::contains("--limit"))
        .stdout(predicate::str::contains("--runtime"));
}

#[test]
fn missing_subcommand_fails_with_usage() {
    Command::cargo_bin("playpen")
        .expect("binary not built")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unknown_flag_is_rejected() {
    Command::cargo_bin("playpen")
        .expect("binary not built")
        .args(["run", "--bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--bogus"));
}

#[test]
fn invalid_runtime_value_is_rejected() {
    Command::cargo_bin("playpen")
        .expect("binary not built")
        .args(["run", "--runtime", "lxd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lxd"));
}
