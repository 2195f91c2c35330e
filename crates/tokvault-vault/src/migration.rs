// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot migration of legacy plaintext tokens into the encrypted vault.
//!
//! Each legacy secret goes through [`TokenVault::add_token`]. Duplicates are
//! skipped, so re-running converges; other failures are recorded and the run
//! continues. A legacy file is renamed to `.backup`, never deleted, once
//! every secret in it has been accounted for without failure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokvault_core::VaultError;
use tracing::{info, warn};

use crate::vault::TokenVault;

/// Legacy plaintext layout: `{ "<user_id>": ["<token>", ...] }`.
pub type LegacyTokens = BTreeMap<String, Vec<String>>;

/// One secret that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    pub user_id: String,
    /// Position in the user's legacy list (0-based).
    pub index: usize,
    pub reason: String,
}

/// Report of what the migration did.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Secrets newly stored in the vault.
    pub migrated: usize,
    /// Secrets already in the vault (skipped).
    pub skipped_duplicate: usize,
    /// Secrets that failed, with the reason.
    pub failed: Vec<MigrationFailure>,
    /// Where the legacy file was moved, if it was.
    pub backup_path: Option<PathBuf>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn absorb(&mut self, other: MigrationReport) {
        self.migrated += other.migrated;
        self.skipped_duplicate += other.skipped_duplicate;
        self.failed.extend(other.failed);
    }
}

/// Runs legacy migrations through a [`TokenVault`].
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    vault: Arc<TokenVault>,
}

impl MigrationRunner {
    pub fn new(vault: Arc<TokenVault>) -> Self {
        Self { vault }
    }

    /// Migrate one user's legacy secrets. Never fails as a whole: per-secret
    /// errors land in [`MigrationReport::failed`].
    pub async fn migrate(&self, user_id: &str, legacy: &[String]) -> MigrationReport {
        let mut report = MigrationReport::default();

        for (index, secret) in legacy.iter().enumerate() {
            let display_name = format!("Migrated token {}", index + 1);
            match self.vault.add_token(user_id, secret, &display_name).await {
                Ok(record_id) => {
                    report.migrated += 1;
                    info!(user_id = %user_id, record_id = %record_id, index, "legacy token migrated");
                }
                Err(VaultError::DuplicateToken { existing, .. }) => {
                    report.skipped_duplicate += 1;
                    info!(user_id = %user_id, existing = %existing, index, "legacy token already in vault -- skipping");
                }
                Err(e) => {
                    warn!(user_id = %user_id, index, error = %e, "legacy token migration failed");
                    report.failed.push(MigrationFailure {
                        user_id: user_id.to_string(),
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Migrate every user in a legacy JSON file, then move the file aside.
    ///
    /// The file is renamed to `<name>.backup` (or `<name>.backup.N` if that
    /// exists) only when no secret failed; otherwise it stays in place for a
    /// re-run. Unreadable or malformed files are an error and nothing is migrated.
    pub async fn migrate_file(&self, path: &Path) -> Result<MigrationReport, VaultError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(VaultError::storage)?;
        let legacy: LegacyTokens = serde_json::from_str(&content).map_err(VaultError::storage)?;

        let mut report = MigrationReport::default();
        for (user_id, secrets) in &legacy {
            report.absorb(self.migrate(user_id, secrets).await);
        }

        if report.is_clean() {
            let backup = backup_path_for(path).await?;
            tokio::fs::rename(path, &backup)
                .await
                .map_err(VaultError::storage)?;
            info!(
                source = %path.display(),
                backup = %backup.display(),
                migrated = report.migrated,
                skipped = report.skipped_duplicate,
                "legacy token file migrated"
            );
            report.backup_path = Some(backup);
        } else {
            warn!(
                source = %path.display(),
                failed = report.failed.len(),
                "legacy token file left in place after failures"
            );
        }

        Ok(report)
    }
}

async fn backup_path_for(path: &Path) -> Result<PathBuf, VaultError> {
    let mut name = path.as_os_str().to_os_string();
    name.push(".backup");
    let base = PathBuf::from(name);

    let mut candidate = base.clone();
    let mut n = 1u32;
    while tokio::fs::try_exists(&candidate)
        .await
        .map_err(VaultError::storage)?
    {
        let mut name = base.as_os_str().to_os_string();
        name.push(format!(".{n}"));
        candidate = PathBuf::from(name);
        n += 1;
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DigitalOceanTokenFormat;
    use crate::kdf::KeyDeriver;
    use crate::master_key::MasterKey;
    use crate::store::MemoryTokenStore;
    use tempfile::tempdir;

    fn runner() -> (Arc<TokenVault>, MigrationRunner) {
        let vault = Arc::new(
            TokenVault::new(
                MasterKey::generate().unwrap(),
                Arc::new(MemoryTokenStore::new()),
                Arc::new(DigitalOceanTokenFormat),
            )
            .with_key_deriver(KeyDeriver::new(1_000).unwrap()),
        );
        (vault.clone(), MigrationRunner::new(vault))
    }

    fn token(c: char) -> String {
        format!("dop_v1_{}", c.to_string().repeat(64))
    }

    #[tokio::test]
    async fn migrate_stores_secrets_with_positional_names() {
        let (vault, runner) = runner();
        let report = runner.migrate("u1", &[token('a'), token('b')]).await;

        assert_eq!(report.migrated, 2);
        let names: Vec<_> = vault
            .list_tokens("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.display_name)
            .collect();
        assert_eq!(names, ["Migrated token 1", "Migrated token 2"]);
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let (vault, runner) = runner();
        let legacy = vec![token('a'), token('b'), token('c')];

        let first = runner.migrate("u1", &legacy).await;
        assert_eq!(first.migrated, 3);

        let second = runner.migrate("u1", &legacy).await;
        assert_eq!(second.migrated, 0);
        assert_eq!(second.skipped_duplicate, 3);
        assert_eq!(vault.list_tokens("u1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicates_within_one_list_are_skipped() {
        let (_, runner) = runner();
        let report = runner.migrate("u1", &[token('a'), token('a')]).await;
        assert_eq!(report.migrated, 1);
        assert_eq!(report.skipped_duplicate, 1);
    }

    #[tokio::test]
    async fn failures_are_recorded_and_processing_continues() {
        let (_, runner) = runner();
        let report = runner
            .migrate("u1", &["garbage".to_string(), token('d')])
            .await;

        assert_eq!(report.migrated, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 0);
        assert!(!report.failed[0].reason.contains("garbage"));
    }

    #[tokio::test]
    async fn clean_file_is_renamed_to_backup() {
        let (vault, runner) = runner();
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        let legacy = serde_json::json!({ "u1": [token('a')], "u2": [token('b'), token('c')] });
        std::fs::write(&path, legacy.to_string()).unwrap();

        let report = runner.migrate_file(&path).await.unwrap();

        assert_eq!(report.migrated, 3);
        assert!(!path.exists());
        let backup = dir.path().join("legacy.json.backup");
        assert_eq!(report.backup_path.as_deref(), Some(backup.as_path()));
        assert!(backup.exists());
        assert_eq!(vault.user_ids().await.unwrap(), vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn existing_backup_is_not_overwritten() {
        let (_, runner) = runner();
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(dir.path().join("legacy.json.backup"), "older").unwrap();
        std::fs::write(&path, serde_json::json!({ "u1": [token('e')] }).to_string()).unwrap();

        let report = runner.migrate_file(&path).await.unwrap();

        assert_eq!(
            report.backup_path,
            Some(dir.path().join("legacy.json.backup.1"))
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("legacy.json.backup")).unwrap(),
            "older"
        );
    }

    #[tokio::test]
    async fn file_with_failures_stays_in_place() {
        let (_, runner) = runner();
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, serde_json::json!({ "u1": ["nope", token('f')] }).to_string())
            .unwrap();

        let report = runner.migrate_file(&path).await.unwrap();

        assert!(!report.is_clean());
        assert!(report.backup_path.is_none());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn malformed_file_is_a_storage_error() {
        let (_, runner) = runner();
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(
            runner.migrate_file(&path).await,
            Err(VaultError::Storage { .. })
        ));
        assert!(path.exists());
    }
}
