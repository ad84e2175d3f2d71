//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own HOME so config and
//! snapshot files never leak between tests. `--ephemeral` keeps the OS
//! keyring out of the picture.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_guardshift"))
        .args(args)
        .env("HOME", home)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("GUARDSHIFT_ENV")
        .env_remove("GUARDSHIFT_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn help_lists_command_groups() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["--help"]);
    assert_eq!(code, 0);
    for group in ["session", "shift", "break", "stats", "config"] {
        assert!(stdout.contains(group), "missing {group} in help");
    }
}

#[test]
fn config_defaults_are_readable() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "api.base_url"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "http://localhost:3000/api");
}

#[test]
fn config_set_persists() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(home.path(), &["config", "set", "api.timeout_secs", "30"]);
    assert_eq!(code, 0);

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "api.timeout_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "30");
}

#[test]
fn config_rejects_unknown_key_and_bad_value() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "api.nope", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (_, _, code) = run_cli(home.path(), &["config", "set", "api.timeout_secs", "0"]);
    assert_eq!(code, 1);

    let (_, _, code) = run_cli(home.path(), &["config", "get", "api.nope"]);
    assert_eq!(code, 1);
}

#[test]
fn config_list_and_path() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("api.base_url = http://localhost:3000/api"));
    assert!(stdout.contains("credentials.key_prefix = guardshift"));

    let (stdout, _, code) = run_cli(home.path(), &["config", "list", "--json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["api"]["past_limit"], 20);

    let (stdout, _, code) = run_cli(home.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));
    assert!(stdout.contains("guardshift"));
}

#[test]
fn session_status_without_login() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["--ephemeral", "session", "status"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "not signed in");

    let (stdout, _, code) =
        run_cli(home.path(), &["--ephemeral", "--json", "session", "status"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["signedIn"], false);
}

#[test]
fn login_accepts_any_positive_lifetime() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(
        home.path(),
        &[
            "--ephemeral",
            "session",
            "login",
            "--access-token",
            "t",
            "--expires-in",
            "9223372036854775807",
        ],
    );
    assert_eq!(code, 0);
    assert!(stdout.starts_with("signed in until"));

    let (_, _, code) = run_cli(
        home.path(),
        &["--ephemeral", "session", "login", "--access-token", "t", "--expires-in", "0"],
    );
    assert_eq!(code, 2);
}

#[test]
fn shift_commands_require_a_session() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["--ephemeral", "shift", "sync"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not signed in"));

    let (_, stderr, code) = run_cli(
        home.path(),
        &["--ephemeral", "shift", "check-in", "S1", "--lat", "40.7", "--lon", "-74.0"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("not signed in"));
}

#[test]
fn elapsed_without_active_shift_fails() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["--ephemeral", "shift", "elapsed"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no active shift"));
}

#[test]
fn break_status_without_open_break() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["--ephemeral", "break", "status"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "no open break");
}

#[test]
fn unknown_break_type_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["--ephemeral", "break", "start", "nap"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("unknown break type"));
}

#[test]
fn stats_range_needs_both_ends() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(home.path(), &["--ephemeral", "stats", "--from", "2026-03-01"]);
    assert_eq!(code, 2);
}
