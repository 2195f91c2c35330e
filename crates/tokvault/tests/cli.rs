// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives the `tokvault` binary against an isolated data directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("tokvault.toml");
        let data_dir = dir.path().join("data");
        std::fs::write(
            &config,
            format!("[storage]\ndata_dir = {:?}\n", data_dir.display().to_string()),
        )
        .unwrap();
        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tokvault"));
        cmd.args(args)
            .arg("--config")
            .arg(&self.config)
            .current_dir(self.dir.path())
            .env_remove("TOKVAULT_TOKEN")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().unwrap()
    }

    fn add(&self, user: &str, token: &str) -> Output {
        self.command(&["add", "--user", user, "--name", "prod"])
            .env("TOKVAULT_TOKEN", token)
            .output()
            .unwrap()
    }
}

fn token(n: u8) -> String {
    format!("dop_v1_{:064x}", n)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn add_reveal_list_revoke_roundtrip() {
    let sandbox = Sandbox::new();

    let added = sandbox.add("u1", &token(1));
    assert!(added.status.success(), "add failed: {}", stderr(&added));
    assert!(stdout(&added).contains("stored token 0 for u1"));

    let revealed = sandbox.run(&["reveal", "--user", "u1", "0"]);
    assert!(revealed.status.success());
    assert_eq!(stdout(&revealed).trim(), token(1));

    let listed = sandbox.run(&["list", "--user", "u1", "--json"]);
    let views: serde_json::Value = serde_json::from_slice(&listed.stdout).unwrap();
    assert_eq!(views[0]["usage_count"], 1);
    assert_eq!(views[0]["display_name"], "prod");
    assert!(views[0].get("secret").is_none());

    let revoked = sandbox.run(&["revoke-all", "--user", "u1"]);
    assert!(stdout(&revoked).contains("1 token(s) revoked"));

    let active = sandbox.run(&["list", "--user", "u1", "--active", "--json"]);
    let views: serde_json::Value = serde_json::from_slice(&active.stdout).unwrap();
    assert_eq!(views, serde_json::json!([]));
}

#[test]
fn duplicate_add_fails_with_message() {
    let sandbox = Sandbox::new();
    assert!(sandbox.add("u1", &token(2)).status.success());

    let again = sandbox.add("u1", &token(2));
    assert!(!again.status.success());
    assert!(stderr(&again).contains("duplicate token"));
}

#[test]
fn secrets_never_reach_the_log() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .command(&["add", "--user", "u1"])
        .env("TOKVAULT_TOKEN", token(3))
        .env("RUST_LOG", "trace")
        .output()
        .unwrap();
    assert!(output.status.success());

    let log = stderr(&output);
    assert!(log.contains("token added"));
    assert!(!log.contains(&token(3)));
}

#[test]
fn migrate_imports_and_backs_up() {
    let sandbox = Sandbox::new();
    let legacy = sandbox.path().join("legacy.json");
    std::fs::write(
        &legacy,
        serde_json::json!({ "u1": [token(4), token(5)] }).to_string(),
    )
    .unwrap();

    let output = sandbox.run(&["migrate", legacy.to_str().unwrap()]);
    assert!(output.status.success(), "migrate failed: {}", stderr(&output));
    assert!(stdout(&output).contains("migrated 2, skipped 0 duplicate(s), 0 failed"));
    assert!(!legacy.exists());
    assert!(sandbox.path().join("legacy.json.backup").exists());
}

#[test]
fn check_reports_healthy_vault() {
    let sandbox = Sandbox::new();
    assert!(sandbox.add("u1", &token(6)).status.success());

    let output = sandbox.run(&["check", "--plain"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("All checks passed."));
    assert!(out.contains("1 token(s), 1 active"));
}

#[test]
fn check_fails_on_corrupt_master_key() {
    let sandbox = Sandbox::new();
    std::fs::create_dir_all(sandbox.path().join("data")).unwrap();
    std::fs::write(sandbox.path().join("data").join("master.key"), b"short").unwrap();

    let output = sandbox.run(&["check", "--plain"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("[FAIL]"));
}

#[test]
fn unknown_config_key_is_rejected() {
    let sandbox = Sandbox::new();
    std::fs::write(&sandbox.config, "[vault]\nkdf_iteratons = 200000\n").unwrap();

    let output = sandbox.run(&["check", "--plain"]);
    assert!(!output.status.success());
}

#[test]
fn cleanup_with_zero_days_is_refused_and_deletes_nothing() {
    let sandbox = Sandbox::new();
    assert!(sandbox.add("u1", &token(7)).status.success());

    let output = sandbox.run(&["cleanup", "--days", "0"]);
    assert!(!output.status.success());

    let listed = sandbox.run(&["list", "--user", "u1", "--json"]);
    let views: serde_json::Value = serde_json::from_slice(&listed.stdout).unwrap();
    assert_eq!(views.as_array().map(Vec::len), Some(1));
}
