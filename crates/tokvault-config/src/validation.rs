// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as the KDF iteration floor and TTL ordering.

use crate::diagnostic::ConfigError;
use crate::model::{MAX_SESSION_TTL_SECS, MIN_KDF_ITERATIONS, TokvaultConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TokvaultConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.data_dir.as_os_str().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.data_dir must not be empty".to_string(),
        });
    }

    if config.storage.token_file.as_os_str().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.token_file must not be empty".to_string(),
        });
    }

    if config.storage.master_key_file.as_os_str().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.master_key_file must not be empty".to_string(),
        });
    }

    if config.storage.token_path() == config.storage.master_key_path() {
        errors.push(ConfigError::Validation {
            message: "storage.token_file and storage.master_key_file must be different files"
                .to_string(),
        });
    }

    if config.vault.kdf_iterations < MIN_KDF_ITERATIONS {
        errors.push(ConfigError::Validation {
            message: format!(
                "vault.kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
                config.vault.kdf_iterations
            ),
        });
    }

    if config.session.max_ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "session.max_ttl_secs must be greater than 0".to_string(),
        });
    } else if config.session.max_ttl_secs > MAX_SESSION_TTL_SECS {
        errors.push(ConfigError::Validation {
            message: format!(
                "session.max_ttl_secs must be at most {MAX_SESSION_TTL_SECS}, got {}",
                config.session.max_ttl_secs
            ),
        });
    }

    if config.session.default_ttl_secs > config.session.max_ttl_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "session.default_ttl_secs ({}) must not exceed session.max_ttl_secs ({})",
                config.session.default_ttl_secs, config.session.max_ttl_secs
            ),
        });
    }

    if config.retention.retention_days == 0 {
        errors.push(ConfigError::Validation {
            message: "retention.retention_days must be at least 1".to_string(),
        });
    }

    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
