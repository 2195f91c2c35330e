// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token format checks run before a secret is accepted.

use std::sync::LazyLock;

use regex::Regex;
use tokvault_core::{TokenValidator, VaultError};

/// Prefixed DigitalOcean tokens (personal access, OAuth, refresh) or legacy bare hex.
static DIGITALOCEAN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(do[opr]_v1_)?[a-f0-9]{64}$").unwrap());

/// Accepts DigitalOcean API tokens: `dop_v1_`, `doo_v1_`, or `dor_v1_`
/// followed by 64 lowercase hex characters, or a legacy unprefixed 64-hex token.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigitalOceanTokenFormat;

impl TokenValidator for DigitalOceanTokenFormat {
    fn validate(&self, secret: &str) -> Result<(), VaultError> {
        if DIGITALOCEAN_TOKEN.is_match(secret) {
            Ok(())
        } else {
            // Never echo the input: it may be a real secret with a typo.
            Err(VaultError::InvalidFormat(format!(
                "expected a DigitalOcean API token (dop_v1_ followed by 64 hex characters), got {} characters",
                secret.chars().count()
            )))
        }
    }
}

/// Accepts any non-empty secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyToken;

impl TokenValidator for AcceptAnyToken {
    fn validate(&self, secret: &str) -> Result<(), VaultError> {
        if secret.is_empty() {
            return Err(VaultError::InvalidFormat("token must not be empty".to_string()));
        }
        Ok(())
    }
}
