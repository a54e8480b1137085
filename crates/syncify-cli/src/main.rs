//! Syncify CLI
//!
//! Command-line interface for Syncify - keeps Tidal playlists in sync with Spotify.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use syncify_core::error::classify;
use syncify_core::{Config, ErrorKind, Store};

mod commands;
mod oauth;
mod output;
mod progress;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "syncify")]
#[command(about = "Syncify - Keep Tidal playlists in sync with Spotify")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to Spotify through the browser
    Login,
    /// Forget the stored Spotify login
    Logout,
    /// List your Spotify playlists and which ones are synced
    #[command(alias = "ls")]
    Playlists,
    /// Start syncing a Spotify playlist
    Add {
        /// Spotify playlist ID
        source_id: String,
    },
    /// Stop syncing a playlist
    #[command(alias = "rm")]
    Remove {
        /// Tidal playlist ID (or the Spotify one)
        id: String,
        /// Also drop the stored pairing; adding it again creates a new Tidal playlist
        #[arg(long)]
        forget: bool,
    },
    /// Sync exactly these Spotify playlists
    Select {
        /// Spotify playlist IDs
        #[arg(required = true)]
        source_ids: Vec<String>,
    },
    /// Stop syncing every playlist
    Clear,
    /// Sync all selected playlists to Tidal
    Sync,
    /// Show login state and synced playlists
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (see `syncify config show`)
        key: String,
        /// Configuration value ("none" or "" to unset)
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = classify(&e).and_then(ErrorKind::recovery_suggestion) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let config =
        Config::load_with_cli_override(cli.config.as_ref()).context("Failed to load configuration")?;
    init_logging(&config, cli.verbose)?;

    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let store = Store::open_with_config(config)?;

    match cli.command {
        Commands::Login => commands::login::login(&store, &output).await,
        Commands::Logout => commands::login::logout(&store, &output),
        Commands::Playlists => commands::playlist::list(&store, &output).await,
        Commands::Add { source_id } => commands::playlist::add(&store, source_id, &output).await,
        Commands::Remove { id, forget } => {
            commands::playlist::remove(&store, id, forget, &output)
        }
        Commands::Select { source_ids } => {
            commands::playlist::select(&store, source_ids, &output).await
        }
        Commands::Clear => commands::playlist::clear(&store, &output),
        Commands::Sync => commands::sync::sync(store, &output).await,
        Commands::Status => commands::status::show(&store, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Set up tracing
///
/// `RUST_LOG` overrides the level chosen with `-v`. Logs go to stderr
/// unless `log_file` is configured.
fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("syncify_core={},syncify_cli={}", level, level))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    // A second init (e.g. in tests) is harmless
    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
    Ok(())
}
