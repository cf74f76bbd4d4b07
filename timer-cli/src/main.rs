//! # bgtimer
//!
//! Command-line front end for the bgtimer multiplayer turn timer.
//!
//! ## Commands
//!
//! - `code`: Generate a session code and show this device's id
//! - `play`: Run an interactive game
//! - `demo`: Show a host and a participant replicating through one store
//!
//! ## Example
//!
//! ```bash
//! # Play a local game with a countdown clock
//! bgtimer --config timer.toml play --offline
//!
//! # Watch two devices stay in step
//! bgtimer demo --seconds 3
//! ```

use anyhow::{Context, Result};
use bgtimer_client::ClientConfig;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{code, demo, play};

/// Multiplayer turn timer for board games.
#[derive(Parser, Debug)]
#[command(name = "bgtimer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log replication activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a session code and show this device's id
    Code,

    /// Run an interactive game, reading commands from stdin
    Play {
        /// Join an existing session instead of hosting a new one
        #[arg(long)]
        join: Option<String>,

        /// Play without a session store
        #[arg(long)]
        offline: bool,
    },

    /// Run a host and a participant side by side on one store
    Demo {
        /// How long the host's clock runs
        #[arg(long, default_value = "3")]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Code => code::run(),
        Commands::Play { join, offline } => play::run(config, join.as_deref(), offline).await?,
        Commands::Demo { seconds } => demo::run(config, seconds).await?,
    }

    Ok(())
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::from_file(path).context("Failed to load configuration"),
        None => Ok(ClientConfig::default()),
    }
}
