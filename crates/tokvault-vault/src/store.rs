// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`TokenStore`] backends.
//!
//! [`FileTokenStore`] keeps every user's set in one JSON document
//! (`{ "<user_id>": { "next_id": .., "records": [..] } }`) and replaces it
//! atomically: write a temp file in the same directory, fsync, rename over
//! the target. Readers therefore see either the previous document or the
//! next one, never a torn write.
//!
//! All writes go through one async mutex, because a save is a
//! read-modify-write of the whole document.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokvault_core::{TokenStore, UserTokenSet, VaultError};
use tracing::debug;

type Document = BTreeMap<String, UserTokenSet>;

/// Single-file JSON store with atomic replace.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Document, VaultError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_document(&path))
            .await
            .map_err(join_err)?
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load_user(&self, user_id: &str) -> Result<UserTokenSet, VaultError> {
        let mut doc = self.read().await?;
        Ok(doc.remove(user_id).unwrap_or_default())
    }

    async fn save_user(&self, user_id: &str, set: &UserTokenSet) -> Result<(), VaultError> {
        let _guard = self.write_lock.lock().await;

        let path = self.path.clone();
        let user_id = user_id.to_string();
        let set = set.clone();
        tokio::task::spawn_blocking(move || {
            let mut doc = read_document(&path)?;
            if set == UserTokenSet::default() {
                doc.remove(&user_id);
            } else {
                doc.insert(user_id.clone(), set);
            }
            write_document(&path, &doc)?;
            debug!(user_id = %user_id, users = doc.len(), path = %path.display(), "token store written");
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn user_ids(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.read().await?.into_keys().collect())
    }
}

fn read_document(path: &Path) -> Result<Document, VaultError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
        Err(e) => return Err(VaultError::storage(e)),
    };
    if content.trim().is_empty() {
        return Ok(Document::new());
    }
    serde_json::from_str(&content).map_err(VaultError::storage)
}

fn write_document(path: &Path, doc: &Document) -> Result<(), VaultError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(VaultError::storage)?;

    // NamedTempFile is created 0600 on unix.
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(VaultError::storage)?;
    serde_json::to_writer_pretty(&mut tmp, doc).map_err(VaultError::storage)?;
    tmp.write_all(b"\n").map_err(VaultError::storage)?;
    tmp.as_file().sync_all().map_err(VaultError::storage)?;
    tmp.persist(path).map_err(|e| VaultError::storage(e.error))?;
    Ok(())
}

fn join_err(e: tokio::task::JoinError) -> VaultError {
    VaultError::Internal(format!("token store task failed: {e}"))
}

/// In-process store for tests and embedding. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    users: RwLock<HashMap<String, UserTokenSet>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_user(&self, user_id: &str) -> Result<UserTokenSet, VaultError> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_user(&self, user_id: &str, set: &UserTokenSet) -> Result<(), VaultError> {
        let mut users = self.users.write().await;
        if *set == UserTokenSet::default() {
            users.remove(user_id);
        } else {
            users.insert(user_id.to_string(), set.clone());
        }
        Ok(())
    }

    async fn user_ids(&self) -> Result<Vec<String>, VaultError> {
        let mut ids: Vec<String> = self.users.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;
    use tokvault_core::{RecordId, TokenRecord};

    fn set_with(names: &[&str]) -> UserTokenSet {
        let mut set = UserTokenSet::default();
        for name in names {
            set.insert(TokenRecord {
                id: RecordId(0),
                fingerprint: format!("fp-{name}"),
                salt: vec![9; 16],
                ciphertext: vec![8; 44],
                display_name: name.to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                usage_count: 0,
                is_valid: true,
                revoked_at: None,
                revocation_reason: None,
            });
        }
        set
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        assert!(store.load_user("u1").await.unwrap().is_empty());
        assert!(store.user_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");
        let store = FileTokenStore::new(&path);
        let set = set_with(&["prod", "staging"]);

        store.save_user("u1", &set).await.unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.load_user("u1").await.unwrap(), set);
    }

    #[tokio::test]
    async fn saving_one_user_keeps_others() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        store.save_user("u1", &set_with(&["a"])).await.unwrap();
        store.save_user("u2", &set_with(&["b"])).await.unwrap();

        assert_eq!(store.user_ids().await.unwrap(), vec!["u1", "u2"]);
        assert_eq!(store.load_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn default_set_removes_user_entry() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        store.save_user("u1", &set_with(&["a"])).await.unwrap();
        store.save_user("u1", &UserTokenSet::default()).await.unwrap();
        assert!(store.user_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn emptied_set_keeps_id_counter() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        let mut set = set_with(&["a"]);
        set.remove(RecordId(0));
        store.save_user("u1", &set).await.unwrap();
        assert_eq!(store.load_user("u1").await.unwrap().next_id, 1);
    }

    #[tokio::test]
    async fn document_uses_documented_field_encoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = FileTokenStore::new(&path);
        store.save_user("u1", &set_with(&["prod"])).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let record = &raw["u1"]["records"][0];
        assert_eq!(record["fingerprint"], "fp-prod");
        assert_eq!(record["salt"], "CQkJCQkJCQkJCQkJCQkJCQ==");
        assert_eq!(record["usage_count"], 0);
        assert_eq!(record["is_valid"], true);
        assert!(record["revoked_at"].is_null());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = FileTokenStore::new(&path);
        assert!(matches!(
            store.load_user("u1").await,
            Err(VaultError::Storage { .. })
        ));
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        for i in 0..5 {
            store
                .save_user(&format!("u{i}"), &set_with(&["a"]))
                .await
                .unwrap();
        }
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_for_different_users_all_land() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(FileTokenStore::new(dir.path().join("tokens.json")));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save_user(&format!("user-{i:02}"), &set_with(&["a"]))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.user_ids().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn memory_store_behaves_like_file_store() {
        let store = MemoryTokenStore::new();
        assert!(store.load_user("u1").await.unwrap().is_empty());
        store.save_user("u2", &set_with(&["b"])).await.unwrap();
        store.save_user("u1", &set_with(&["a"])).await.unwrap();
        assert_eq!(store.user_ids().await.unwrap(), vec!["u1", "u2"]);
        store.save_user("u1", &UserTokenSet::default()).await.unwrap();
        assert_eq!(store.user_ids().await.unwrap(), vec!["u2"]);
    }
}
