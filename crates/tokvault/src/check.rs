// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tokvault check` command implementation.
//!
//! Runs the startup sequence step by step (configuration, master key, token
//! store) and reports each step, so an operator sees which one would stop the
//! vault from starting.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use tokvault_config::TokvaultConfig;
use tokvault_core::{TokenStore, VaultError};
use tokvault_vault::{FileTokenStore, MasterKeyStore};

/// Status of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: String, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
            duration: start.elapsed(),
        }
    }
}

/// Run `tokvault check`. Returns the number of failed checks.
pub async fn run_check(
    config: &TokvaultConfig,
    plain: bool,
    show_config: bool,
) -> Result<usize, VaultError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    if show_config {
        let rendered = toml::to_string_pretty(config)
            .map_err(|e| VaultError::Internal(format!("failed to render config: {e}")))?;
        println!("{rendered}");
    }

    let mut results = vec![check_config(config), check_master_key(config)];
    let (store_result, users) = check_token_store(config).await;
    results.push(store_result);

    println!();
    println!("  tokvault check");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;
    for result in &results {
        match result.status {
            CheckStatus::Fail => fail_count += 1,
            CheckStatus::Warn => warn_count += 1,
            CheckStatus::Pass => {}
        }
        println!("{}", format_line(result, use_color));
    }

    if !users.is_empty() {
        println!();
        for (user, total, active) in &users {
            println!("    {user:<28} {total} token(s), {active} active");
        }
    }

    println!();
    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(fail_count)
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal().to_string()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow().to_string()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red().to_string()),
        };
        format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// The config was already loaded and validated; report where it points.
fn check_config(config: &TokvaultConfig) -> CheckResult {
    let start = Instant::now();
    CheckResult::new(
        "Configuration",
        CheckStatus::Pass,
        format!(
            "valid (data dir {}, {} KDF iterations)",
            config.storage.data_dir.display(),
            config.vault.kdf_iterations
        ),
        start,
    )
}

fn check_master_key(config: &TokvaultConfig) -> CheckResult {
    let start = Instant::now();
    let path = config.storage.master_key_path();
    let existed = path.exists();

    match MasterKeyStore::new(&path).get_key() {
        Ok(_) if existed => CheckResult::new(
            "Master key",
            CheckStatus::Pass,
            format!("loaded {}", path.display()),
            start,
        ),
        Ok(_) => CheckResult::new(
            "Master key",
            CheckStatus::Warn,
            format!("generated new key at {} -- back it up", path.display()),
            start,
        ),
        Err(e) => CheckResult::new("Master key", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Read every user's set; returns `(user, total, active)` per user.
async fn check_token_store(config: &TokvaultConfig) -> (CheckResult, Vec<(String, usize, usize)>) {
    let start = Instant::now();
    let path = config.storage.token_path();

    if !path.exists() {
        return (
            CheckResult::new(
                "Token store",
                CheckStatus::Pass,
                format!("empty (will be created at {})", path.display()),
                start,
            ),
            Vec::new(),
        );
    }

    let store = FileTokenStore::new(&path);
    let summary = async {
        let mut users = Vec::new();
        for user in store.user_ids().await? {
            let set = store.load_user(&user).await?;
            let active = set.iter().filter(|r| r.is_valid).count();
            users.push((user, set.len(), active));
        }
        Ok::<_, VaultError>(users)
    }
    .await;

    match summary {
        Ok(users) => {
            let total: usize = users.iter().map(|(_, total, _)| total).sum();
            (
                CheckResult::new(
                    "Token store",
                    CheckStatus::Pass,
                    format!("{total} token(s) across {} user(s)", users.len()),
                    start,
                ),
                users,
            )
        }
        Err(e) => (
            CheckResult::new("Token store", CheckStatus::Fail, e.to_string(), start),
            Vec::new(),
        ),
    }
}
