// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! didpool - outbound caller-ID rotation service.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use didpool_config::{ConfigError, DidpoolConfig};

/// didpool - outbound caller-ID rotation service.
#[derive(Parser, Debug)]
#[command(name = "didpool", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP allocation service.
    Serve,
    /// Show per-tenant pool and rotation state from the database.
    Status {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Load and validate configuration, then exit.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<DidpoolConfig, Vec<ConfigError>> {
    match path {
        Some(path) => didpool_config::load_and_validate_path(path),
        None => didpool_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            didpool_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::CheckConfig) => {
            println!(
                "didpool: configuration OK (database={}, listen={}:{})",
                config.storage.database_path, config.server.host, config.server.port
            );
            Ok(())
        }
        None => {
            println!("didpool: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("didpool: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn cli_parses_subcommands() {
        let cli = Cli::parse_from(["didpool", "status", "--json"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Status { json: true, plain: false })
        ));

        let cli = Cli::parse_from(["didpool", "--config", "/tmp/d.toml", "check-config"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/d.toml")));
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("didpool.toml");
        std::fs::write(&path, "[server]\nport = 6111\n").unwrap();
        let config = load(Some(&path)).expect("config should load");
        assert_eq!(config.server.port, 6111);
    }
}
