//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against a throwaway HOME so the real
//! data directory is never touched.

use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::TempDir;

fn run_cli_with_input(home: &TempDir, args: &[&str], input: &str) -> (i32, String, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_roundtrack-cli"))
        .args(args)
        .env("HOME", home.path())
        .env_remove("ROUNDTRACK_ENV")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI command");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait for CLI");

    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn run_cli(home: &TempDir, args: &[&str]) -> (i32, String, String) {
    run_cli_with_input(home, args, "")
}

fn add_user(home: &TempDir) -> i64 {
    let (code, stdout, stderr) = run_cli(home, &["user", "add", "Ana", "--goal", "5"]);
    assert_eq!(code, 0, "user add failed: {stderr}");
    let user: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    user["id"].as_i64().unwrap()
}

#[test]
fn test_config_get_set() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(&home, &["config", "get", "timer.duration_min"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "25");

    let (code, _, _) = run_cli(&home, &["config", "set", "timer.duration_min", "30"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(&home, &["config", "get", "timer.duration_min"]);
    assert_eq!(stdout.trim(), "30");

    let (code, _, stderr) = run_cli(&home, &["config", "set", "timer.red_pct", "90"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error"));
}

#[test]
fn test_user_lifecycle() {
    let home = TempDir::new().unwrap();
    let id = add_user(&home);

    let (code, _, _) = run_cli(&home, &["user", "deactivate", &id.to_string()]);
    assert_eq!(code, 0);

    let (_, stdout, _) = run_cli(&home, &["user", "list"]);
    let active: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert!(active.is_empty());

    let (_, stdout, _) = run_cli(&home, &["user", "list", "--all"]);
    let all: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["active"], false);
}

#[test]
fn test_session_finish_records_block() {
    let home = TempDir::new().unwrap();
    let id = add_user(&home).to_string();

    let (code, stdout, stderr) = run_cli_with_input(
        &home,
        &["session", "--user", &id],
        "+ realizado 4\n+ cancelado\nfinish\nquit\n",
    );
    assert_eq!(code, 0, "session failed: {stderr}");
    assert!(stdout.contains("\"type\":\"BlockFinalized\""));
    assert!(stdout.contains("\"achievement\":\"first_block\""));

    let (_, stdout, _) = run_cli(&home, &["stats", "today", "--user", &id]);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["processes"][0]["done"], 4);
    assert_eq!(stats["processes"][0]["success_pct"], 80.0);

    let (_, stdout, _) = run_cli(&home, &["sync", "status"]);
    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    // user + block + profile
    assert_eq!(status["pending_count"], 3);
}

#[test]
fn test_destructive_commands_need_confirmation() {
    let home = TempDir::new().unwrap();
    let id = add_user(&home).to_string();

    let (code, _, stderr) = run_cli(&home, &["day", "new", "--user", &id]);
    assert_ne!(code, 0);
    assert!(stderr.contains("confirmation"));

    let (code, _, _) = run_cli(&home, &["sync", "clear"]);
    assert_ne!(code, 0);
    let (code, stdout, _) = run_cli(&home, &["sync", "clear", "--confirm"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("discarded 1"));
}

#[test]
fn test_sync_drain_without_endpoint_fails() {
    let home = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(&home, &["sync", "drain"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("not configured"));
}
