//! Integration tests for the `shellyops` CLI binary.
//!
//! Argument parsing, help output, completions, registry listing and
//! pre-flight failures; none of them needs a reachable device.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const MANIFEST: &str = "\
version: '1.0'
devices:
  - device_id: shellyplus1-a8032abe5400
    name: Garden Pump
    folder: garden-pump-shellyplus1-a8032abe5400
    ip_address: 192.0.2.10
    model: SNSW-001X16EU
";

/// Build a [`Command`] for the binary with env isolation, pointed at `repo`.
///
/// Config directories point at a nonexistent path and every `SHELLYOPS_*`
/// variable is cleared so tests never touch the user's real configuration.
fn shellyops(repo: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("shellyops");
    cmd.env("HOME", "/tmp/shellyops-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/shellyops-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("SHELLYOPS_REPO")
        .env_remove("SHELLYOPS_OUTPUT")
        .env_remove("SHELLYOPS_TIMEOUT")
        .env_remove("SHELLYOPS_MANIFEST")
        .env_remove("SHELLYOPS_VALUES")
        .env_remove("RUST_LOG");
    if let Some(parent) = repo.parent() {
        // Keep git from finding an enclosing repository.
        cmd.env("GIT_CEILING_DIRECTORIES", parent);
    }
    cmd.arg("--repo").arg(repo);
    cmd
}

fn repo_with_manifest() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("manifest.yaml"), MANIFEST).unwrap();
    tmp
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let output = cargo_bin_cmd!("shellyops").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn help_lists_commands() {
    cargo_bin_cmd!("shellyops").arg("--help").assert().success().stdout(
        predicate::str::contains("pull")
            .and(predicate::str::contains("push"))
            .and(predicate::str::contains("devices")),
    );
}

#[test]
fn version_flag() {
    cargo_bin_cmd!("shellyops")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shellyops"));
}

#[test]
fn push_help_documents_dry_run() {
    cargo_bin_cmd!("shellyops")
        .args(["push", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run").and(predicate::str::contains("--devices")));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn completions_zsh() {
    cargo_bin_cmd!("shellyops")
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn completions_bash() {
    cargo_bin_cmd!("shellyops")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Registry ────────────────────────────────────────────────────────

#[test]
fn devices_list_renders_table() {
    let repo = repo_with_manifest();
    shellyops(repo.path())
        .args(["devices", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("shellyplus1-a8032abe5400")
                .and(predicate::str::contains("Garden Pump"))
                .and(predicate::str::contains("never")),
        );
}

#[test]
fn devices_list_as_json() {
    let repo = repo_with_manifest();
    let output = shellyops(repo.path())
        .args(["devices", "list", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let devices: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(devices[0]["device_id"], "shellyplus1-a8032abe5400");
    assert_eq!(devices[0]["ip_address"], "192.0.2.10");
}

#[test]
fn devices_list_without_manifest_is_empty() {
    let repo = tempfile::tempdir().unwrap();
    shellyops(repo.path())
        .args(["devices", "list", "-o", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn removing_unknown_device_is_preflight_failure() {
    let repo = repo_with_manifest();
    shellyops(repo.path())
        .args(["devices", "remove", "shelly1-ghost"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("shelly1-ghost"));
}

#[test]
fn removing_device_keeps_folder() {
    let repo = repo_with_manifest();
    let folder = repo.path().join("garden-pump-shellyplus1-a8032abe5400");
    std::fs::create_dir(&folder).unwrap();

    shellyops(repo.path())
        .args(["devices", "remove", "shellyplus1-a8032abe5400"])
        .assert()
        .success();

    assert!(folder.is_dir());
    let manifest = std::fs::read_to_string(repo.path().join("manifest.yaml")).unwrap();
    assert!(!manifest.contains("shellyplus1-a8032abe5400"));
}

// ── Pre-flight failures ─────────────────────────────────────────────

#[test]
fn pull_outside_git_checkout_is_preflight_failure() {
    let repo = repo_with_manifest();
    shellyops(repo.path()).arg("pull").assert().code(3);
}

#[test]
fn push_with_unknown_device_filter_fails() {
    let repo = repo_with_manifest();
    shellyops(repo.path())
        .args(["push", "--devices", "shelly1-ghost"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("shelly1-ghost"));
}

#[test]
fn push_with_missing_values_file_fails() {
    let repo = repo_with_manifest();
    let missing = repo.path().join("staging.yaml");
    shellyops(repo.path())
        .args(["push", "--dry-run", "--values"])
        .arg(&missing)
        .assert()
        .code(3);
}

#[test]
fn zero_timeout_is_usage_error() {
    let repo = repo_with_manifest();
    shellyops(repo.path())
        .args(["devices", "list", "--timeout", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("timeout"));
}

#[test]
fn invalid_subcommand_fails() {
    let repo = tempfile::tempdir().unwrap();
    shellyops(repo.path()).arg("frobnicate").assert().code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn config_show_prints_defaults() {
    let repo = tempfile::tempdir().unwrap();
    shellyops(repo.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout = 30").and(predicate::str::contains("manifest.yaml")));
}
