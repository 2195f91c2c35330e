// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokvault - encrypted storage for DigitalOcean API tokens.
//!
//! This is the operator CLI over the token vault.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokvault_config::{ConfigError, TokvaultConfig};
use tokvault_core::RecordId;
use tokvault_security::SharedRedactingWriter;

/// Tokvault - encrypted storage for DigitalOcean API tokens.
#[derive(Parser, Debug)]
#[command(name = "tokvault", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt and store a token (read from TOKVAULT_TOKEN or a prompt).
    Add {
        /// Owner of the token.
        #[arg(long)]
        user: String,
        /// Human-readable label.
        #[arg(long, default_value = "DigitalOcean token")]
        name: String,
    },
    /// List a user's tokens (metadata only).
    List {
        #[arg(long)]
        user: String,
        /// Only tokens that have not been revoked.
        #[arg(long)]
        active: bool,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Decrypt one token and print it to stdout.
    Reveal {
        #[arg(long)]
        user: String,
        id: u64,
    },
    /// Revoke one token.
    Revoke {
        #[arg(long)]
        user: String,
        id: u64,
        #[arg(long, default_value = "revoked by operator")]
        reason: String,
    },
    /// Revoke every token of a user.
    RevokeAll {
        #[arg(long)]
        user: String,
    },
    /// Permanently delete one token.
    Remove {
        #[arg(long)]
        user: String,
        id: u64,
    },
    /// Delete tokens unused for longer than the retention period.
    Cleanup {
        /// Override `retention.retention_days` (at least 1).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,
    },
    /// Import a legacy plaintext token file (`{"user": ["token", ...]}`).
    Migrate { path: PathBuf },
    /// Verify configuration, master key, and token store.
    Check {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
        /// Print the effective configuration as TOML.
        #[arg(long)]
        show_config: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            tokvault_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };
    let redactor = init_tracing(&config.logging.level);

    let result = match cli.command {
        Commands::Add { user, name } => commands::run_add(&config, &redactor, &user, &name).await,
        Commands::List { user, active, json } => {
            commands::run_list(&config, &user, active, json).await
        }
        Commands::Reveal { user, id } => commands::run_reveal(&config, &user, RecordId(id)).await,
        Commands::Revoke { user, id, reason } => {
            commands::run_revoke(&config, &user, RecordId(id), &reason).await
        }
        Commands::RevokeAll { user } => commands::run_revoke_all(&config, &user).await,
        Commands::Remove { user, id } => commands::run_remove(&config, &user, RecordId(id)).await,
        Commands::Cleanup { days } => commands::run_cleanup(&config, days).await,
        Commands::Migrate { path } => commands::run_migrate(&config, &path).await,
        Commands::Check { plain, show_config } => {
            match check::run_check(&config, plain, show_config).await {
                Ok(0) => Ok(()),
                Ok(_) => return ExitCode::FAILURE,
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tokvault: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TokvaultConfig, Vec<ConfigError>> {
    match path {
        Some(path) => tokvault_config::load_and_validate_path(path),
        None => tokvault_config::load_and_validate(),
    }
}

/// Install the global subscriber. Every line passes through the redacting
/// writer; the returned handle registers extra values to scrub.
fn init_tracing(log_level: &str) -> SharedRedactingWriter {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tokvault={log_level},warn")));
    let writer = SharedRedactingWriter::new();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer.clone())
        .with_target(true)
        .with_thread_names(false)
        .init();

    writer
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_revoke_with_default_reason() {
        let cli = Cli::try_parse_from(["tokvault", "revoke", "--user", "u1", "3"]).unwrap();
        match cli.command {
            Commands::Revoke { user, id, reason } => {
                assert_eq!(user, "u1");
                assert_eq!(id, 3);
                assert_eq!(reason, "revoked by operator");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["tokvault", "check", "--config", "/tmp/t.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/t.toml")));
    }

    #[test]
    fn token_is_never_a_cli_argument() {
        assert!(Cli::try_parse_from(["tokvault", "add", "--user", "u1", "dop_v1_abc"]).is_err());
    }

    #[test]
    fn cleanup_rejects_zero_day_retention() {
        assert!(Cli::try_parse_from(["tokvault", "cleanup", "--days", "0"]).is_err());

        let cli = Cli::try_parse_from(["tokvault", "cleanup", "--days", "1"]).unwrap();
        match cli.command {
            Commands::Cleanup { days } => assert_eq!(days, Some(1)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokvault.toml");
        std::fs::write(&path, "[retention]\nretention_days = 30\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.retention.retention_days, 30);
    }
}
