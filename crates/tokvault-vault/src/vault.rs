// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token lifecycle: add, read, list, revoke, remove, and sweep stored tokens.
//!
//! Envelope layout:
//! - One master key per deployment (see [`MasterKeyStore`]).
//! - Each record gets a random salt; its key is PBKDF2(user_id, master key, salt).
//! - The record's ciphertext is AES-256-GCM under that key with the user id
//!   as associated data, so it only opens for the user it was written for.
//!
//! Concurrency: each user has an async mutex held across every
//! read-modify-persist section (including revealing reads, which bump usage
//! counters). Metadata reads take no lock and rely on the store's atomic
//! replace. A user's mutex is dropped from the lock map once the last
//! holder releases it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use secrecy::SecretString;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokvault_config::TokvaultConfig;
use tokvault_core::{RecordId, TokenRecord, TokenStore, TokenValidator, TokenView, VaultError};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN};
use crate::fingerprint::fingerprint;
use crate::format::{AcceptAnyToken, DigitalOceanTokenFormat};
use crate::kdf::{self, KeyDeriver};
use crate::master_key::{MasterKey, MasterKeyStore};
use crate::store::FileTokenStore;

/// Reason recorded by [`TokenVault::revoke_all`].
pub const BULK_REVOCATION_REASON: &str = "bulk revocation";

/// The vault: master key in memory, records in a [`TokenStore`].
///
/// Debug output intentionally omits the master key.
pub struct TokenVault {
    master_key: MasterKey,
    deriver: KeyDeriver,
    store: Arc<dyn TokenStore>,
    validator: Arc<dyn TokenValidator>,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("master_key", &"[REDACTED]")
            .field("kdf_iterations", &self.deriver.iterations())
            .field("store", &self.store.name())
            .finish()
    }
}

impl TokenVault {
    /// Assemble a vault from its parts, using the production KDF cost.
    pub fn new(
        master_key: MasterKey,
        store: Arc<dyn TokenStore>,
        validator: Arc<dyn TokenValidator>,
    ) -> Self {
        Self {
            master_key,
            deriver: KeyDeriver::default(),
            store,
            validator,
            user_locks: DashMap::new(),
        }
    }

    /// Replace the key deriver (tests lower the iteration count).
    pub fn with_key_deriver(mut self, deriver: KeyDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    /// Open the file-backed vault described by `config`.
    ///
    /// Loads (or on first run creates) the master key. Any master key problem
    /// is fatal: the vault refuses to start rather than run without it.
    pub fn open(config: &TokvaultConfig) -> Result<Self, VaultError> {
        let master_key = MasterKeyStore::new(config.storage.master_key_path()).get_key()?;
        let store = Arc::new(FileTokenStore::new(config.storage.token_path()));
        let validator: Arc<dyn TokenValidator> = if config.vault.enforce_token_format {
            Arc::new(DigitalOceanTokenFormat)
        } else {
            warn!("token format enforcement disabled");
            Arc::new(AcceptAnyToken)
        };
        let deriver = KeyDeriver::new(config.vault.kdf_iterations)?;

        info!(
            tokens = %config.storage.token_path().display(),
            kdf_iterations = deriver.iterations(),
            "token vault opened"
        );
        Ok(Self::new(master_key, store, validator).with_key_deriver(deriver))
    }

    pub(crate) fn master_key(&self) -> &MasterKey {
        &self.master_key
    }

    /// Encrypt and store a new token for `user_id`. Returns the new record's id.
    ///
    /// Surrounding whitespace is trimmed before validation. Fails with
    /// [`VaultError::InvalidFormat`] if the validator rejects the token and
    /// with [`VaultError::DuplicateToken`] if the user already holds a
    /// non-revoked record with the same fingerprint.
    pub async fn add_token(
        &self,
        user_id: &str,
        plaintext: &str,
        display_name: &str,
    ) -> Result<RecordId, VaultError> {
        let secret = plaintext.trim();
        self.validator.validate(secret)?;
        let fingerprint = fingerprint(secret);

        let _guard = self.lock_user(user_id).await;

        let mut set = self.store.load_user(user_id).await?;
        if let Some(existing) = set.find_active(&fingerprint) {
            info!(user_id = %user_id, record_id = %existing.id, fingerprint = %fingerprint, "duplicate token rejected");
            return Err(VaultError::DuplicateToken {
                fingerprint,
                existing: existing.id,
            });
        }

        let salt = kdf::generate_salt()?;
        let key = self.derive_key(user_id, &salt).await?;
        let ciphertext = crypto::seal(&key, secret.as_bytes(), user_id.as_bytes())?;

        let id = set.insert(TokenRecord {
            id: RecordId(0),
            fingerprint: fingerprint.clone(),
            salt: salt.to_vec(),
            ciphertext,
            display_name: display_name.to_string(),
            created_at: Utc::now(),
            last_used_at: None,
            usage_count: 0,
            is_valid: true,
            revoked_at: None,
            revocation_reason: None,
        });
        self.store.save_user(user_id, &set).await?;

        info!(user_id = %user_id, record_id = %id, fingerprint = %fingerprint, "token added");
        Ok(id)
    }

    /// Read one record.
    ///
    /// With `reveal = false` only metadata is returned and nothing changes.
    /// With `reveal = true` the token is decrypted into
    /// [`TokenView::secret`] and the record's usage is counted. Revoked
    /// records still decrypt: revocation is not deletion.
    pub async fn get_token(
        &self,
        user_id: &str,
        record_id: RecordId,
        reveal: bool,
    ) -> Result<TokenView, VaultError> {
        if !reveal {
            let set = self.store.load_user(user_id).await?;
            return set
                .get(record_id)
                .map(TokenRecord::view)
                .ok_or_else(|| not_found(user_id, record_id));
        }

        self.reveal(user_id, record_id, true).await
    }

    /// Decrypt a token for use on the caller's behalf.
    ///
    /// Unlike [`get_token`](Self::get_token) this refuses revoked records
    /// with [`VaultError::TokenRevoked`]. Usage is counted as for a reveal.
    pub async fn use_token(
        &self,
        user_id: &str,
        record_id: RecordId,
    ) -> Result<SecretString, VaultError> {
        let view = self.reveal(user_id, record_id, false).await?;
        view.secret
            .ok_or_else(|| VaultError::Internal("revealed view carried no secret".to_string()))
    }

    async fn reveal(
        &self,
        user_id: &str,
        record_id: RecordId,
        allow_revoked: bool,
    ) -> Result<TokenView, VaultError> {
        let _guard = self.lock_user(user_id).await;

        let mut set = self.store.load_user(user_id).await?;
        let record = set
            .get_mut(record_id)
            .ok_or_else(|| not_found(user_id, record_id))?;
        if !allow_revoked && !record.is_valid {
            info!(user_id = %user_id, record_id = %record_id, "revoked token refused");
            return Err(revoked(user_id, record_id));
        }

        let secret = self.decrypt(user_id, record).await?;
        record.record_use(Utc::now());
        let mut view = record.view();
        self.store.save_user(user_id, &set).await?;

        debug!(user_id = %user_id, record_id = %record_id, "token revealed");
        view.secret = Some(secret);
        Ok(view)
    }

    /// Metadata for every record of `user_id`, revoked ones included, in insertion order.
    pub async fn list_tokens(&self, user_id: &str) -> Result<Vec<TokenView>, VaultError> {
        let set = self.store.load_user(user_id).await?;
        Ok(set.iter().map(TokenRecord::view).collect())
    }

    /// Metadata for the records of `user_id` that are still valid for use.
    pub async fn list_active(&self, user_id: &str) -> Result<Vec<TokenView>, VaultError> {
        let set = self.store.load_user(user_id).await?;
        Ok(set
            .iter()
            .filter(|r| r.is_valid)
            .map(TokenRecord::view)
            .collect())
    }

    /// Revoke one record. Revoking an already-revoked record is a no-op.
    pub async fn revoke(
        &self,
        user_id: &str,
        record_id: RecordId,
        reason: &str,
    ) -> Result<(), VaultError> {
        let _guard = self.lock_user(user_id).await;

        let mut set = self.store.load_user(user_id).await?;
        let record = set
            .get_mut(record_id)
            .ok_or_else(|| not_found(user_id, record_id))?;

        if !record.revoke(Utc::now(), reason) {
            debug!(user_id = %user_id, record_id = %record_id, "token already revoked");
            return Ok(());
        }
        self.store.save_user(user_id, &set).await?;
        info!(user_id = %user_id, record_id = %record_id, reason = %reason, "token revoked");
        Ok(())
    }

    /// Revoke every non-revoked record of `user_id` in a single write.
    /// Returns how many records were revoked.
    pub async fn revoke_all(&self, user_id: &str) -> Result<usize, VaultError> {
        let _guard = self.lock_user(user_id).await;

        let mut set = self.store.load_user(user_id).await?;
        let count = set.revoke_all(Utc::now(), BULK_REVOCATION_REASON);
        if count > 0 {
            self.store.save_user(user_id, &set).await?;
        }
        warn!(user_id = %user_id, count, "all tokens revoked");
        Ok(count)
    }

    /// Hard-delete one record.
    pub async fn remove(&self, user_id: &str, record_id: RecordId) -> Result<(), VaultError> {
        let _guard = self.lock_user(user_id).await;

        let mut set = self.store.load_user(user_id).await?;
        set.remove(record_id)
            .ok_or_else(|| not_found(user_id, record_id))?;
        self.store.save_user(user_id, &set).await?;
        info!(user_id = %user_id, record_id = %record_id, "token removed");
        Ok(())
    }

    /// Hard-delete every record, across all users, whose last use (or
    /// creation, if never used) is at least `retention_period` old.
    /// Returns how many records were removed.
    pub async fn cleanup_expired(&self, retention_period: Duration) -> Result<usize, VaultError> {
        let now = Utc::now();
        let Some(cutoff) = chrono::Duration::from_std(retention_period)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            debug!(?retention_period, "retention period reaches before any timestamp; nothing to sweep");
            return Ok(0);
        };

        let mut removed = 0;
        for user_id in self.store.user_ids().await? {
            let _guard = self.lock_user(&user_id).await;

            let mut set = self.store.load_user(&user_id).await?;
            let count = set.remove_stale(cutoff);
            if count > 0 {
                self.store.save_user(&user_id, &set).await?;
                debug!(user_id = %user_id, count, "expired tokens removed");
                removed += count;
            }
        }

        info!(removed, cutoff = %cutoff, "retention sweep finished");
        Ok(removed)
    }

    /// Every user id with stored records.
    pub async fn user_ids(&self) -> Result<Vec<String>, VaultError> {
        self.store.user_ids().await
    }

    async fn lock_user(&self, user_id: &str) -> UserLockGuard<'_> {
        let lock = Arc::clone(&self.user_locks.entry(user_id.to_string()).or_default());
        let guard = lock.lock_owned().await;
        UserLockGuard {
            locks: &self.user_locks,
            user_id: user_id.to_string(),
            guard: Some(guard),
        }
    }

    /// PBKDF2 is deliberately slow; keep it off the async workers.
    async fn derive_key(
        &self,
        user_id: &str,
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
        let deriver = self.deriver;
        let master_key = self.master_key.clone();
        let user_id = user_id.to_string();
        let salt = salt.to_vec();
        tokio::task::spawn_blocking(move || deriver.derive(&master_key, &user_id, &salt))
            .await
            .map_err(|e| VaultError::Internal(format!("key derivation task failed: {e}")))
    }

    async fn decrypt(
        &self,
        user_id: &str,
        record: &TokenRecord,
    ) -> Result<SecretString, VaultError> {
        let key = self.derive_key(user_id, &record.salt).await?;
        let plaintext = crypto::open(&key, &record.ciphertext, user_id.as_bytes()).map_err(|e| {
            error!(
                user_id = %user_id,
                record_id = %record.id,
                fingerprint = %record.fingerprint,
                error = %e,
                "token failed integrity verification -- possible corruption or tampering"
            );
            VaultError::Decryption {
                user_id: user_id.to_string(),
                record_id: record.id,
            }
        })?;

        let value = std::str::from_utf8(&plaintext).map_err(|_| {
            error!(user_id = %user_id, record_id = %record.id, "decrypted token is not valid UTF-8");
            VaultError::Decryption {
                user_id: user_id.to_string(),
                record_id: record.id,
            }
        })?;
        Ok(SecretString::from(value))
    }
}

/// Holds a user's lock; on drop, forgets the lock if nobody else holds or
/// waits on it, so the map only tracks users with operations in flight.
struct UserLockGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserLockGuard<'_> {
    fn drop(&mut self) {
        // Release first so the guard's Arc no longer counts.
        self.guard.take();
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn revoked(user_id: &str, record_id: RecordId) -> VaultError {
    VaultError::TokenRevoked {
        user_id: user_id.to_string(),
        record_id,
    }
}

fn not_found(user_id: &str, record_id: RecordId) -> VaultError {
    VaultError::TokenNotFound {
        user_id: user_id.to_string(),
        record_id,
    }
}
