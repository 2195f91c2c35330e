// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-way fingerprints for duplicate detection.

use sha2::{Digest, Sha256};

/// Bytes of the SHA-256 digest kept in a fingerprint.
pub const FINGERPRINT_BYTES: usize = 16;

/// Lowercase hex of the first [`FINGERPRINT_BYTES`] of SHA-256(secret).
///
/// Independent of salt and user, so the same secret always fingerprints the same.
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(&digest[..FINGERPRINT_BYTES])
}
