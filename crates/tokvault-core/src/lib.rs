// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tokvault credential vault.
//!
//! This crate provides the error taxonomy, the persisted record types, and
//! the traits that storage backends and token format checks implement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::VaultError;
pub use traits::{TokenStore, TokenValidator};
pub use types::{RecordId, TokenRecord, TokenView, UserTokenSet};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_are_classified() {
        let format = VaultError::InvalidFormat("bad".into());
        let duplicate = VaultError::DuplicateToken {
            fingerprint: "ab".into(),
            existing: RecordId(0),
        };
        let missing = VaultError::TokenNotFound {
            user_id: "u1".into(),
            record_id: RecordId(3),
        };
        let revoked = VaultError::TokenRevoked {
            user_id: "u1".into(),
            record_id: RecordId(3),
        };
        let expired = VaultError::ExpiredSession {
            expired_at: chrono::Utc::now(),
        };
        for err in [&format, &duplicate, &missing, &revoked, &expired] {
            assert!(err.is_user_error(), "{err} should be a user error");
            assert!(!err.is_integrity_failure());
        }
    }

    #[test]
    fn integrity_failures_are_not_user_errors() {
        let decryption = VaultError::Decryption {
            user_id: "u1".into(),
            record_id: RecordId(0),
        };
        assert!(decryption.is_integrity_failure());
        assert!(!decryption.is_user_error());
        assert!(decryption.to_string().contains("possible corruption"));

        let keystore = VaultError::KeyStore("bad length".into());
        assert!(!keystore.is_user_error());
        assert!(!keystore.is_integrity_failure());
    }

    #[test]
    fn storage_helper_boxes_source() {
        let err = VaultError::storage(std::io::Error::other("disk full"));
        assert_eq!(err.to_string(), "storage error: disk full");
    }
}
