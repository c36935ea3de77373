//! Campaign UI - coalesced panel refresh demo shell

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod campaign;
mod cmd;
mod logging;
mod panels;
mod tree;
mod util;

/// Campaign UI - debounced panel refreshes driven by campaign events
#[derive(Parser)]
#[command(name = "campaign-ui")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/campaign-ui/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated campaign and report panel refresh counts
    Simulate(cmd::simulate::SimulateArgs),
    /// View or edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all configuration values
    List,
    /// Print one value
    Get {
        /// Key, e.g. scheduler.default_delay_ms
        key: String,
    },
    /// Set one value and save
    Set {
        /// Key, e.g. scheduler.overrides.finances
        key: String,
        value: String,
    },
    /// Show the config file path
    Path {
        /// Write a default config file if none exists
        #[arg(long)]
        create: bool,
    },
    /// Print a commented example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_file.as_deref())?;

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Simulate(args) => cmd::simulate::run(config, args).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list(config),
            ConfigCommands::Get { key } => cmd::config::run_get(config, &key),
            ConfigCommands::Set { key, value } => cmd::config::run_set(config, &key, &value),
            ConfigCommands::Path { create } => cmd::config::run_path(config, create),
            ConfigCommands::Example => cmd::config::run_example(),
        },
    }
}
