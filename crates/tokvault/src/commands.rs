// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token subcommands: thin wrappers that open the vault and print results.

use std::path::Path;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tokvault_config::TokvaultConfig;
use tokvault_core::{RecordId, TokenView, VaultError};
use tokvault_security::SharedRedactingWriter;
use tokvault_vault::{MigrationRunner, TokenVault};

/// Run `tokvault add`.
pub async fn run_add(
    config: &TokvaultConfig,
    redactor: &SharedRedactingWriter,
    user: &str,
    name: &str,
) -> Result<(), VaultError> {
    let secret = tokvault_vault::read_secret()?;
    redactor.add_known_value(secret.expose_secret().trim());

    let vault = TokenVault::open(config)?;
    let id = vault.add_token(user, secret.expose_secret(), name).await?;
    println!("stored token {id} for {user}");
    Ok(())
}

/// Run `tokvault list`.
pub async fn run_list(
    config: &TokvaultConfig,
    user: &str,
    active_only: bool,
    json: bool,
) -> Result<(), VaultError> {
    let vault = TokenVault::open(config)?;
    let views = if active_only {
        vault.list_active(user).await?
    } else {
        vault.list_tokens(user).await?
    };

    if json {
        let out = serde_json::to_string_pretty(&views)
            .map_err(|e| VaultError::Internal(format!("failed to encode listing: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    if views.is_empty() {
        println!("no tokens for {user}");
        return Ok(());
    }
    println!(
        "  {:<5} {:<24} {:<32} {:<8} {:>6}  last used",
        "id", "name", "fingerprint", "status", "uses"
    );
    for view in &views {
        println!("{}", format_row(view));
    }
    Ok(())
}

fn format_row(view: &TokenView) -> String {
    let status = if view.is_valid { "active" } else { "revoked" };
    let last_used = view
        .last_used_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "  {:<5} {:<24} {:<32} {:<8} {:>6}  {last_used}",
        view.id.to_string(),
        truncate(&view.display_name, 24),
        view.fingerprint,
        status,
        view.usage_count
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('~');
        out
    }
}

/// Run `tokvault reveal`. The plaintext goes to stdout only, never to the log.
pub async fn run_reveal(
    config: &TokvaultConfig,
    user: &str,
    id: RecordId,
) -> Result<(), VaultError> {
    let vault = TokenVault::open(config)?;
    let view = vault.get_token(user, id, true).await?;
    let secret = view
        .secret
        .ok_or_else(|| VaultError::Internal("revealed view carried no secret".to_string()))?;
    if !view.is_valid {
        eprintln!("warning: token {id} is revoked");
    }
    println!("{}", secret.expose_secret());
    Ok(())
}

/// Run `tokvault revoke`.
pub async fn run_revoke(
    config: &TokvaultConfig,
    user: &str,
    id: RecordId,
    reason: &str,
) -> Result<(), VaultError> {
    let vault = TokenVault::open(config)?;
    vault.revoke(user, id, reason).await?;
    println!("token {id} revoked");
    Ok(())
}

/// Run `tokvault revoke-all`.
pub async fn run_revoke_all(config: &TokvaultConfig, user: &str) -> Result<(), VaultError> {
    let vault = TokenVault::open(config)?;
    let count = vault.revoke_all(user).await?;
    println!("{count} token(s) revoked for {user}");
    Ok(())
}

/// Run `tokvault remove`.
pub async fn run_remove(
    config: &TokvaultConfig,
    user: &str,
    id: RecordId,
) -> Result<(), VaultError> {
    let vault = TokenVault::open(config)?;
    vault.remove(user, id).await?;
    println!("token {id} removed");
    Ok(())
}

/// Run `tokvault cleanup`.
pub async fn run_cleanup(config: &TokvaultConfig, days: Option<u32>) -> Result<(), VaultError> {
    let mut retention = config.retention.clone();
    if let Some(days) = days {
        retention.retention_days = days;
    }

    let vault = TokenVault::open(config)?;
    let removed = vault.cleanup_expired(retention.period()).await?;
    println!(
        "{removed} token(s) unused for {} day(s) removed",
        retention.retention_days
    );
    Ok(())
}

/// Run `tokvault migrate`.
pub async fn run_migrate(config: &TokvaultConfig, path: &Path) -> Result<(), VaultError> {
    let vault = Arc::new(TokenVault::open(config)?);
    let report = MigrationRunner::new(vault).migrate_file(path).await?;

    println!(
        "migrated {}, skipped {} duplicate(s), {} failed",
        report.migrated,
        report.skipped_duplicate,
        report.failed.len()
    );
    for failure in &report.failed {
        println!(
            "  {} #{}: {}",
            failure.user_id,
            failure.index + 1,
            failure.reason
        );
    }
    match &report.backup_path {
        Some(backup) => println!("legacy file moved to {}", backup.display()),
        None => println!("legacy file left in place; fix the failures and re-run"),
    }
    Ok(())
}
