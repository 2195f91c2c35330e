// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tokvault credential vault.

use thiserror::Error;

use crate::types::RecordId;

/// The primary error type returned by every vault operation.
///
/// Input errors (`InvalidFormat`, `DuplicateToken`, `TokenNotFound`,
/// `TokenRevoked`, `ExpiredSession`) are recoverable by the caller and are
/// never retried by the vault itself. Integrity failures are kept distinct
/// from absence so operators can tell corruption from a wrong id.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The submitted secret failed the external format check.
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    /// A non-revoked record with the same fingerprint already exists for this user.
    #[error("duplicate token: fingerprint {fingerprint} already stored as record {existing}")]
    DuplicateToken {
        fingerprint: String,
        existing: RecordId,
    },

    /// No record with this id exists for this user.
    #[error("token not found: user {user_id} has no record {record_id}")]
    TokenNotFound { user_id: String, record_id: RecordId },

    /// The record exists but was revoked, so it may not be used.
    #[error("token revoked: user {user_id} record {record_id}")]
    TokenRevoked { user_id: String, record_id: RecordId },

    /// AEAD verification failed (wrong key, tampered or truncated ciphertext).
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// A stored record failed integrity verification on decryption.
    #[error("decryption failed for user {user_id} record {record_id} -- possible corruption or tampering")]
    Decryption { user_id: String, record_id: RecordId },

    /// The session reference is past its expiry.
    #[error("session expired at {expired_at}")]
    ExpiredSession {
        expired_at: chrono::DateTime<chrono::Utc>,
    },

    /// The session reference is malformed, tampered with, or was issued by another process.
    #[error("invalid session reference: {0}")]
    InvalidSession(String),

    /// The master key is missing, unreadable, or corrupt.
    #[error("master key store error: {0}")]
    KeyStore(String),

    /// Persistence failure (I/O, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Cryptographic primitive failure (RNG, key construction).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Invalid vault configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Wrap any error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Whether this error stems from caller input and can be fixed by resubmitting.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_)
                | Self::DuplicateToken { .. }
                | Self::TokenNotFound { .. }
                | Self::TokenRevoked { .. }
                | Self::ExpiredSession { .. }
        )
    }

    /// Whether this error indicates possible corruption or tampering.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::Integrity(_) | Self::Decryption { .. } | Self::InvalidSession(_)
        )
    }
}
