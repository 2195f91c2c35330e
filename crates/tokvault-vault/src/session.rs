// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-lived opaque references to a single vault record.
//!
//! A reference is `base64url(seal(session_key, claims_json))`, where the
//! claims carry user, record, issue/expiry times and a random nonce. The
//! session key is HKDF-SHA256 over the master key, salted with a random
//! epoch chosen when the issuer is built: references are opaque and
//! tamper-evident to holders, and a new issuer (e.g. after restart) cannot
//! resolve references from an old one. Nothing is persisted.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use ring::hkdf;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokvault_config::model::SessionConfig;
use tokvault_core::{RecordId, VaultError};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN};
use crate::vault::TokenVault;

/// Associated data for session blobs, so record ciphertexts never open as sessions.
const SESSION_AAD: &[u8] = b"tokvault-session-v1";
const SESSION_KEY_INFO: &[u8] = b"tokvault session key";
const EPOCH_LEN: usize = 32;
const NONCE_LEN: usize = 16;

/// Opaque handle that resolves to one record's secret until it expires.
///
/// Debug output intentionally omits the reference itself.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionReference(String);

impl std::fmt::Debug for SessionReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionReference").field(&"[REDACTED]").finish()
    }
}

impl SessionReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for SessionReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    user_id: String,
    record_id: RecordId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    nonce: String,
}

/// Issues and resolves [`SessionReference`]s against a [`TokenVault`].
pub struct SessionIssuer {
    vault: Arc<TokenVault>,
    key: Zeroizing<[u8; KEY_LEN]>,
    default_ttl: Duration,
    max_ttl: Duration,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("key", &"[REDACTED]")
            .field("default_ttl", &self.default_ttl)
            .field("max_ttl", &self.max_ttl)
            .finish()
    }
}

impl SessionIssuer {
    /// Build an issuer with a fresh random epoch.
    pub fn new(vault: Arc<TokenVault>, config: &SessionConfig) -> Result<Self, VaultError> {
        let epoch: [u8; EPOCH_LEN] = crypto::random_bytes()?;
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &epoch);
        let prk = salt.extract(vault.master_key().as_bytes());

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        prk.expand(&[SESSION_KEY_INFO], hkdf::HKDF_SHA256)
            .and_then(|okm| okm.fill(&mut key[..]))
            .map_err(|_| VaultError::Crypto("session key derivation failed".to_string()))?;

        Ok(Self {
            vault,
            key,
            default_ttl: Duration::from_secs(config.default_ttl_secs),
            max_ttl: Duration::from_secs(config.max_ttl_secs),
        })
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a reference to `record_id` of `user_id`, valid for `ttl`.
    ///
    /// The record must exist and not be revoked when issued
    /// ([`VaultError::TokenRevoked`] otherwise). A `ttl` above the configured
    /// maximum, or one that overflows the calendar, is rejected with
    /// [`VaultError::InvalidSession`].
    pub async fn issue(
        &self,
        user_id: &str,
        record_id: RecordId,
        ttl: Duration,
    ) -> Result<SessionReference, VaultError> {
        if ttl > self.max_ttl {
            return Err(VaultError::InvalidSession(format!(
                "requested ttl {}s exceeds maximum {}s",
                ttl.as_secs(),
                self.max_ttl.as_secs()
            )));
        }
        if !self.vault.get_token(user_id, record_id, false).await?.is_valid {
            debug!(user_id = %user_id, record_id = %record_id, "session refused for revoked token");
            return Err(VaultError::TokenRevoked {
                user_id: user_id.to_string(),
                record_id,
            });
        }

        let issued_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                VaultError::InvalidSession(format!("session ttl {}s out of range", ttl.as_secs()))
            })?;
        let nonce: [u8; NONCE_LEN] = crypto::random_bytes()?;
        let claims = SessionClaims {
            user_id: user_id.to_string(),
            record_id,
            issued_at,
            expires_at,
            nonce: hex::encode(nonce),
        };

        let json = serde_json::to_vec(&claims)
            .map_err(|e| VaultError::Internal(format!("failed to encode session: {e}")))?;
        let sealed = crypto::seal(&self.key, &json, SESSION_AAD)?;

        debug!(user_id = %user_id, record_id = %record_id, expires_at = %claims.expires_at, "session issued");
        Ok(SessionReference(URL_SAFE_NO_PAD.encode(sealed)))
    }

    /// Issue with the configured default TTL.
    pub async fn issue_default(
        &self,
        user_id: &str,
        record_id: RecordId,
    ) -> Result<SessionReference, VaultError> {
        self.issue(user_id, record_id, self.default_ttl).await
    }

    /// Resolve a reference to its record's plaintext.
    ///
    /// Fails with [`VaultError::ExpiredSession`] once `expires_at` is reached,
    /// [`VaultError::TokenRevoked`] if the record was revoked after issue,
    /// and [`VaultError::InvalidSession`] for anything that does not open
    /// under this issuer's key. Counts as a use of the record.
    pub async fn resolve(&self, reference: &SessionReference) -> Result<SecretString, VaultError> {
        let claims = self.open_claims(reference)?;

        if Utc::now() >= claims.expires_at {
            debug!(user_id = %claims.user_id, record_id = %claims.record_id, "session expired");
            return Err(VaultError::ExpiredSession {
                expired_at: claims.expires_at,
            });
        }

        self.vault.use_token(&claims.user_id, claims.record_id).await
    }

    fn open_claims(&self, reference: &SessionReference) -> Result<SessionClaims, VaultError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(reference.as_str())
            .map_err(|_| VaultError::InvalidSession("malformed session reference".to_string()))?;
        let json = crypto::open(&self.key, &sealed, SESSION_AAD).map_err(|_| {
            warn!("session reference failed verification");
            VaultError::InvalidSession("session reference failed verification".to_string())
        })?;
        serde_json::from_slice(&json)
            .map_err(|_| VaultError::InvalidSession("undecodable session claims".to_string()))
    }
}
