// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-record key derivation with PBKDF2-HMAC-SHA256.
//!
//! The KDF password is `user_id || ':' || master_key`, the salt is the
//! record's random salt. Output is a 32-byte AES-256-GCM key. Derivation is
//! pure: no I/O, no caching, no shared state.

use std::num::NonZeroU32;

use ring::pbkdf2;
use tokvault_core::VaultError;
use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN};
use crate::master_key::MasterKey;

/// Per-record salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Production iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

const DEFAULT_ITERATIONS_NZ: NonZeroU32 = NonZeroU32::new(DEFAULT_ITERATIONS).unwrap();

/// Derives per-user, per-record encryption keys from the master key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDeriver {
    iterations: NonZeroU32,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS_NZ,
        }
    }
}

impl KeyDeriver {
    /// Create a deriver with an explicit iteration count.
    ///
    /// Configuration validation enforces the production floor; lower counts
    /// are accepted here so tests stay fast.
    pub fn new(iterations: u32) -> Result<Self, VaultError> {
        let iterations = NonZeroU32::new(iterations)
            .ok_or_else(|| VaultError::Config("KDF iteration count must be non-zero".to_string()))?;
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations.get()
    }

    /// Derive the key for `(user_id, salt)`. Same inputs always give the same key.
    pub fn derive(
        &self,
        master_key: &MasterKey,
        user_id: &str,
        salt: &[u8],
    ) -> Zeroizing<[u8; KEY_LEN]> {
        let mut password = Zeroizing::new(Vec::with_capacity(user_id.len() + 1 + KEY_LEN));
        password.extend_from_slice(user_id.as_bytes());
        password.push(b':');
        password.extend_from_slice(master_key.as_bytes());

        let mut output = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            salt,
            &password,
            &mut output[..],
        );
        output
    }
}

/// Generate a random per-record salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN], VaultError> {
    crypto::random_bytes()
}
