// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-supplied token format check.

use crate::error::VaultError;

/// Decides whether a submitted secret looks like a token the vault should accept.
///
/// Runs before any fingerprinting or encryption. Rejections surface as
/// [`VaultError::InvalidFormat`].
pub trait TokenValidator: Send + Sync + 'static {
    fn validate(&self, secret: &str) -> Result<(), VaultError>;
}

impl<F> TokenValidator for F
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    fn validate(&self, secret: &str) -> Result<(), VaultError> {
        if self(secret) {
            Ok(())
        } else {
            Err(VaultError::InvalidFormat(
                "rejected by format predicate".to_string(),
            ))
        }
    }
}
