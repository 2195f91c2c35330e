// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token acquisition via TTY prompt or the TOKVAULT_TOKEN environment variable.
//!
//! Tokens never come from command-line arguments, which end up in shell
//! history and process listings.

use secrecy::SecretString;
use tokvault_core::VaultError;

/// The environment variable name for providing a token non-interactively.
pub const TOKEN_ENV_VAR: &str = "TOKVAULT_TOKEN";

/// Read a token to store.
///
/// Priority:
/// 1. `TOKVAULT_TOKEN` environment variable (scripts, CI)
/// 2. Interactive TTY prompt via `rpassword`, with no echo
pub fn read_secret() -> Result<SecretString, VaultError> {
    if let Ok(token) = std::env::var(TOKEN_ENV_VAR)
        && !token.trim().is_empty()
    {
        return Ok(SecretString::from(token));
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        eprint!("DigitalOcean token: ");
        let token = rpassword::read_password()
            .map_err(|e| VaultError::InvalidFormat(format!("failed to read token: {e}")))?;
        if token.trim().is_empty() {
            return Err(VaultError::InvalidFormat("empty token not allowed".to_string()));
        }
        return Ok(SecretString::from(token));
    }

    Err(VaultError::InvalidFormat(
        "no token provided. Set TOKVAULT_TOKEN or run interactively.".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    #[test]
    #[serial]
    fn reads_token_from_env_var() {
        // SAFETY: test-only env mutation, serialized with the other env tests.
        unsafe { std::env::set_var(TOKEN_ENV_VAR, "dop_v1_abc") };
        let result = read_secret();
        unsafe { std::env::remove_var(TOKEN_ENV_VAR) };

        assert_eq!(result.unwrap().expose_secret(), "dop_v1_abc");
    }

    #[test]
    #[serial]
    fn blank_env_var_is_ignored() {
        unsafe { std::env::set_var(TOKEN_ENV_VAR, "   ") };
        // Test stdin is not a terminal, so there is nothing to fall back to.
        let result = read_secret();
        unsafe { std::env::remove_var(TOKEN_ENV_VAR) };

        assert!(matches!(result, Err(VaultError::InvalidFormat(_))));
    }
}
