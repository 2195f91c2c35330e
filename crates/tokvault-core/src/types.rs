// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted vault entities and the caller-facing token view.
//!
//! Records are strongly typed: sensitive material (`salt`, `ciphertext`)
//! never appears on [`TokenView`], and plaintext only appears there when a
//! caller explicitly asked for it.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Stable identifier of a record within one user's token set.
///
/// Ids are assigned in insertion order starting at 0 and are never reused,
/// even after hard deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stored secret: the AEAD payload plus its non-sensitive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: RecordId,
    /// Truncated SHA-256 of the plaintext, hex encoded.
    pub fingerprint: String,
    /// Per-record KDF salt. Not secret.
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    /// `nonce || ciphertext || tag`.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub is_valid: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl TokenRecord {
    /// Whether the record has been revoked (or invalidated by external validation).
    pub fn is_revoked(&self) -> bool {
        !self.is_valid
    }

    /// Count one use. `usage_count` only increases and `last_used_at` never moves back.
    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used_at = Some(match self.last_used_at {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }

    /// Mark the record revoked. Returns `false` if it already was.
    pub fn revoke(&mut self, now: DateTime<Utc>, reason: &str) -> bool {
        if self.is_revoked() {
            return false;
        }
        self.is_valid = false;
        self.revoked_at = Some(now);
        self.revocation_reason = Some(reason.to_string());
        true
    }

    /// The instant the retention policy measures age from.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.last_used_at.unwrap_or(self.created_at)
    }

    /// Metadata-only view of this record.
    pub fn view(&self) -> TokenView {
        TokenView {
            id: self.id,
            display_name: self.display_name.clone(),
            fingerprint: self.fingerprint.clone(),
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            usage_count: self.usage_count,
            is_valid: self.is_valid,
            revoked_at: self.revoked_at,
            revocation_reason: self.revocation_reason.clone(),
            secret: None,
        }
    }
}

/// All records owned by one user, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokenSet {
    /// Next id to hand out. Monotonic; survives deletions.
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub records: Vec<TokenRecord>,
}

impl UserTokenSet {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: RecordId) -> Option<&TokenRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut TokenRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// The non-revoked record carrying this fingerprint, if any.
    pub fn find_active(&self, fingerprint: &str) -> Option<&TokenRecord> {
        self.records
            .iter()
            .find(|r| r.is_valid && r.fingerprint == fingerprint)
    }

    /// Append a record, assigning it the next id. Any id already on `record` is replaced.
    pub fn insert(&mut self, mut record: TokenRecord) -> RecordId {
        // Guard against hand-edited files whose next_id lags behind the records.
        let floor = self.records.iter().map(|r| r.id.0 + 1).max().unwrap_or(0);
        let id = RecordId(self.next_id.max(floor));
        self.next_id = id.0 + 1;
        record.id = id;
        self.records.push(record);
        id
    }

    /// Hard-delete one record.
    pub fn remove(&mut self, id: RecordId) -> Option<TokenRecord> {
        let pos = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(pos))
    }

    /// Revoke every non-revoked record. Returns how many changed.
    pub fn revoke_all(&mut self, now: DateTime<Utc>, reason: &str) -> usize {
        self.records
            .iter_mut()
            .map(|r| r.revoke(now, reason))
            .filter(|changed| *changed)
            .count()
    }

    /// Drop records whose reference time is at or before `cutoff`. Returns how many were removed.
    pub fn remove_stale(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.reference_time() > cutoff);
        before - self.records.len()
    }
}

/// Caller-facing view of a record.
///
/// `secret` is only populated by an explicit reveal and is skipped when
/// serializing, so listing output can never carry plaintext.
#[derive(Debug, Serialize)]
pub struct TokenView {
    pub id: RecordId,
    pub display_name: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub is_valid: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
    #[serde(skip)]
    pub secret: Option<SecretString>,
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
