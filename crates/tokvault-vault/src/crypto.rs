// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the system
//! CSPRNG and prepends it to the output, so a sealed blob is
//! `nonce || ciphertext || tag`. Ciphertext length reveals the plaintext
//! length and nothing else.

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tokvault_core::VaultError;
use zeroize::Zeroizing;

/// Key length required by AES-256-GCM.
pub const KEY_LEN: usize = 32;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Smallest well-formed sealed blob (empty plaintext).
pub const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

fn aead_key(key: &[u8; KEY_LEN]) -> Result<LessSafeKey, VaultError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| VaultError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext`, binding `aad` into the tag.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError> {
    let key = aead_key(key)?;
    let nonce_bytes: [u8; NONCE_LEN] = random_bytes()?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| VaultError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Decrypt a blob produced by [`seal`] with the same key and `aad`.
///
/// Wrong key, wrong `aad`, truncation, or any flipped bit yields
/// [`VaultError::Integrity`]; corrupted plaintext is never returned.
pub fn open(
    key: &[u8; KEY_LEN],
    sealed: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(VaultError::Integrity(format!(
            "sealed data too short ({} bytes, need at least {MIN_SEALED_LEN})",
            sealed.len()
        )));
    }
    let key = aead_key(key)?;
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| VaultError::Integrity("malformed nonce".to_string()))?;

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let plaintext_len = key
        .open_in_place(nonce, Aad::from(aad), in_out.as_mut_slice())
        .map_err(|_| {
            VaultError::Integrity(
                "AES-256-GCM decryption failed -- wrong key or corrupted data".to_string(),
            )
        })?
        .len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}

/// Fill a fixed-size array from the system CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], VaultError> {
    let mut buf = [0u8; N];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| VaultError::Crypto("system random generator failed".to_string()))?;
    Ok(buf)
}
