// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM envelope-encrypted vault for DigitalOcean API tokens.
//!
//! A random master key, kept in its own owner-only file, never encrypts
//! tokens directly: each record gets a PBKDF2-derived key from the master
//! key, the owning user id, and a per-record salt. On top of the vault sit
//! short-lived session references and a one-shot legacy migration.

pub mod crypto;
pub mod fingerprint;
pub mod format;
pub mod kdf;
pub mod master_key;
pub mod migration;
pub mod prompt;
pub mod session;
pub mod store;
pub mod vault;

pub use fingerprint::fingerprint;
pub use format::{AcceptAnyToken, DigitalOceanTokenFormat};
pub use kdf::KeyDeriver;
pub use master_key::{MasterKey, MasterKeyStore};
pub use migration::{MigrationFailure, MigrationReport, MigrationRunner};
pub use prompt::read_secret;
pub use session::{SessionIssuer, SessionReference};
pub use store::{FileTokenStore, MemoryTokenStore};
pub use vault::{BULK_REVOCATION_REASON, TokenVault};
