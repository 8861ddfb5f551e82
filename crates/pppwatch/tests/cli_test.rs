//! Integration tests for the `pppwatch` binary.
//!
//! These cover argument parsing, help output, shell completions, config
//! handling and error exit codes against a throwaway in-memory database,
//! so no router is ever contacted.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const UNKNOWN_ROUTER: &str = "6f1c2a4e-0b7d-4c1e-9a55-3f2d8e9b1c00";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `pppwatch` binary with env isolation.
///
/// Clears all `PPPWATCH_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn pppwatch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pppwatch");
    cmd.env("HOME", "/tmp/pppwatch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/pppwatch-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/pppwatch-cli-test-nonexistent")
        .env_remove("PPPWATCH_CONFIG")
        .env_remove("PPPWATCH_OUTPUT")
        .env_remove("PPPWATCH_ROUTER_PASSWORD")
        .env_remove("PPPWATCH_TELEGRAM_TOKEN")
        .env_remove("PPPWATCH_SECRET_PASSWORD")
        .env_remove("PPPWATCH_DATABASE__URL")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = pppwatch_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    pppwatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("MikroTik")
            .and(predicate::str::contains("routers"))
            .and(predicate::str::contains("subscribers"))
            .and(predicate::str::contains("run")),
    );
}

#[test]
fn test_version_flag() {
    pppwatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pppwatch"));
}

#[test]
fn test_subscribers_help_lists_isolate() {
    pppwatch_cmd()
        .args(["subscribers", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("isolate").and(predicate::str::contains("usage")));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    pppwatch_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pppwatch"));
}

#[test]
fn test_completions_invalid_shell() {
    let output = pppwatch_cmd()
        .args(["completions", "tcsh"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    pppwatch_cmd()
        .args(["config", "path", "--config", "/tmp/somewhere/pppwatch.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/somewhere/pppwatch.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    pppwatch_cmd()
        .args(["config", "init", "--config", path])
        .assert()
        .success();
    assert!(std::fs::read_to_string(path).unwrap().contains("interval_secs"));

    let output = pppwatch_cmd()
        .args(["config", "init", "--config", path])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6), "{}", combined_output(&output));

    pppwatch_cmd()
        .args(["config", "init", "--config", path, "--yes"])
        .assert()
        .success();
}

#[test]
fn test_config_show_merges_file_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[sync]\ninterval_secs = 60\n").unwrap();

    pppwatch_cmd()
        .env("PPPWATCH_CACHE__TTL_SECS", "15")
        .args(["config", "show", "-o", "json", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"interval_secs\": 60")
                .and(predicate::str::contains("\"ttl_secs\": 15")),
        );
}

#[test]
fn test_invalid_config_value_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[sync]\ninterval_secs = 0\n").unwrap();

    let output = pppwatch_cmd()
        .args(["--database", "memory", "routers", "list", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("interval_secs"), "{text}");
}

// ── Routers ─────────────────────────────────────────────────────────

#[test]
fn test_routers_list_empty_json() {
    pppwatch_cmd()
        .args(["--database", "memory", "routers", "list", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_routers_add_prints_new_router() {
    pppwatch_cmd()
        .args([
            "--database",
            "memory",
            "routers",
            "add",
            "--name",
            "Tower A",
            "--host",
            "10.0.0.1",
            "--username",
            "api",
            "--password",
            "secret",
            "--quarantine-profile",
            "ISOLIR",
            "-o",
            "json",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"name\": \"Tower A\"")
                .and(predicate::str::contains("\"quarantine_profile\": \"ISOLIR\""))
                .and(predicate::str::contains("secret").not()),
        );
}

#[test]
fn test_routers_add_rejects_half_telegram_setup() {
    let output = pppwatch_cmd()
        .args([
            "--database",
            "memory",
            "routers",
            "add",
            "--name",
            "Tower A",
            "--host",
            "10.0.0.1",
            "--username",
            "api",
            "--password",
            "secret",
            "--telegram-chat",
            "-100200300",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
}

#[test]
fn test_routers_show_rejects_non_uuid() {
    let output = pppwatch_cmd()
        .args(["--database", "memory", "routers", "show", "tower-a"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("not a router ID"), "{text}");
}

#[test]
fn test_routers_show_unknown_exits_not_found() {
    let output = pppwatch_cmd()
        .args(["--database", "memory", "routers", "show", UNKNOWN_ROUTER])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(text.contains("routers list"), "{text}");
}

// ── Subscribers ─────────────────────────────────────────────────────

#[test]
fn test_subscribers_list_unknown_router() {
    let output = pppwatch_cmd()
        .args(["--database", "memory", "subscribers", "list", UNKNOWN_ROUTER])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_locate_needs_coordinates_or_clear() {
    let output = pppwatch_cmd()
        .args([
            "--database",
            "memory",
            "subscribers",
            "locate",
            UNKNOWN_ROUTER,
            "alice",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
}

#[test]
fn test_locate_accepts_negative_coordinates() {
    // Parsing succeeds; the unknown router is what fails.
    let output = pppwatch_cmd()
        .args([
            "--database",
            "memory",
            "subscribers",
            "locate",
            UNKNOWN_ROUTER,
            "alice",
            "--latitude",
            "-6.2",
            "--longitude",
            "106.8",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}
