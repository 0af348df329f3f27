//! relaycache - request-interception cache layer
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use relaycache::cli::{Cli, Commands};
use relaycache::config::{Config, ConfigManager};
use relaycache::error::RelayResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RelayResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // The log format lives in the config file, so load it first
    let loaded = config_manager.load().await;
    let json_logs = matches!(&loaded, Ok(config) if config.general.log_format == "json");
    init_logging(cli.verbose, json_logs);

    // `config init --force` must work even when the current file is broken
    let config = match (&cli.command, loaded) {
        (Commands::Config(_), Err(e)) => {
            debug!("Ignoring unreadable config for config command: {}", e);
            Config::default()
        }
        (_, loaded) => loaded?,
    };
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Fetch(args) => relaycache::cli::commands::fetch(args, &config).await,
        Commands::Install => relaycache::cli::commands::install(&config).await,
        Commands::Activate => relaycache::cli::commands::activate(&config).await,
        Commands::Message(args) => relaycache::cli::commands::message(&args.json, &config).await,
        Commands::Stores(args) => relaycache::cli::commands::stores(args, &config).await,
        Commands::Config(args) => {
            relaycache::cli::commands::config(args, &config_manager, &config).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("relaycache=warn"),
        1 => EnvFilter::new("relaycache=info"),
        _ => EnvFilter::new("relaycache=debug"),
    };

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .without_time()
            .init();
    }
}
