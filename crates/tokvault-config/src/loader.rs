// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tokvault.toml` > `~/.config/tokvault/tokvault.toml` > `/etc/tokvault/tokvault.toml`
//! with environment variable overrides via `TOKVAULT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TokvaultConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tokvault/tokvault.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "tokvault.toml";

const ENV_SECTIONS: [&str; 5] = ["storage_", "vault_", "session_", "retention_", "logging_"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tokvault/tokvault.toml` (system-wide)
/// 3. `~/.config/tokvault/tokvault.toml` (user XDG config)
/// 4. `./tokvault.toml` (local directory)
/// 5. `TOKVAULT_*` environment variables
pub fn load_config() -> Result<TokvaultConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TokvaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TokvaultConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TokvaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TokvaultConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TokvaultConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tokvault").join(LOCAL_CONFIG_FILE))
                .unwrap_or_default(),
        ))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `TOKVAULT_STORAGE_DATA_DIR` must map to `storage.data_dir`,
/// not `storage.data.dir`. Variables outside the config sections (such as
/// `TOKVAULT_TOKEN`) are not configuration and are skipped.
fn env_provider() -> Env {
    Env::prefixed("TOKVAULT_")
        .filter(|key| {
            let key = key.as_str().to_ascii_lowercase();
            ENV_SECTIONS.iter().any(|section| key.starts_with(section))
        })
        .map(|key| {
            let key_str = key.as_str();
            let mapped = key_str
                .replacen("storage_", "storage.", 1)
                .replacen("vault_", "vault.", 1)
                .replacen("session_", "session.", 1)
                .replacen("retention_", "retention.", 1)
                .replacen("logging_", "logging.", 1);
            mapped.into()
        })
}
