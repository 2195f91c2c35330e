// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Tokvault.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Minimum PBKDF2 iteration count accepted in production configuration.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Upper bound for `session.max_ttl_secs`: one day.
pub const MAX_SESSION_TTL_SECS: u64 = 86_400;

/// Top-level Tokvault configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TokvaultConfig {
    /// Where the token store and master key live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Key derivation and input checks.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Session reference lifetimes.
    #[serde(default)]
    pub session: SessionConfig,

    /// Maintenance sweep policy.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// File locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding the token file and the master key file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Token store file name, relative to `data_dir` unless absolute.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,

    /// Master key file name, relative to `data_dir` unless absolute.
    #[serde(default = "default_master_key_file")]
    pub master_key_file: PathBuf,
}

impl StorageConfig {
    /// Resolved path of the token store.
    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join(&self.token_file)
    }

    /// Resolved path of the master key file.
    pub fn master_key_path(&self) -> PathBuf {
        self.data_dir.join(&self.master_key_file)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            token_file: default_token_file(),
            master_key_file: default_master_key_file(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("tokvault"))
        .unwrap_or_else(|| PathBuf::from(".tokvault"))
}

fn default_token_file() -> PathBuf {
    PathBuf::from("tokens.json")
}

fn default_master_key_file() -> PathBuf {
    PathBuf::from("master.key")
}

/// Vault behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// PBKDF2-HMAC-SHA256 iteration count (default: 100000).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Reject secrets that do not look like DigitalOcean tokens (default: true).
    #[serde(default = "default_true")]
    pub enforce_token_format: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: default_kdf_iterations(),
            enforce_token_format: true,
        }
    }
}

fn default_kdf_iterations() -> u32 {
    MIN_KDF_ITERATIONS
}

fn default_true() -> bool {
    true
}

/// Session reference lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// TTL used when the caller does not pick one (default: 300).
    #[serde(default = "default_session_ttl")]
    pub default_ttl_secs: u64,

    /// Longest TTL a caller may request (default: 3600, at most
    /// [`MAX_SESSION_TTL_SECS`]).
    #[serde(default = "default_session_max_ttl")]
    pub max_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_session_ttl(),
            max_ttl_secs: default_session_max_ttl(),
        }
    }
}

fn default_session_ttl() -> u64 {
    300
}

fn default_session_max_ttl() -> u64 {
    3600
}

/// Retention policy for `cleanup`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Records unused for this many days are hard-deleted by the sweep (default: 90).
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl RetentionConfig {
    /// Retention as a duration (days of 24 hours).
    pub fn period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.retention_days) * 24 * 60 * 60)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
