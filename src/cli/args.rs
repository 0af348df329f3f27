//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Relaycache - request-interception cache layer
///
/// Classifies each outgoing request, answers it from the matching store or
/// the network, and falls back to placeholders when both are unavailable.
#[derive(Parser, Debug)]
#[command(name = "relaycache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "RELAYCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one request through the cache layer
    Fetch(FetchArgs),

    /// Open every store and cache the seed resources
    Install,

    /// Delete stale stores left by older versions
    Activate,

    /// Deliver a JSON control message
    Message(MessageArgs),

    /// Inspect and clear stores
    Stores(StoresArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL to request
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Issue the request as a top-level navigation
    #[arg(long)]
    pub navigate: bool,

    /// Accept header
    #[arg(long)]
    pub accept: Option<String>,

    /// Extra request headers (NAME:VALUE)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Write the body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print status, source and headers before the body
    #[arg(short, long)]
    pub include: bool,
}

/// Arguments for the message command
#[derive(Parser, Debug)]
pub struct MessageArgs {
    /// Message JSON, e.g. '{"type":"CACHE_FONT","url":"https://..."}'
    pub json: String,
}

/// Arguments for the stores command
#[derive(Parser, Debug)]
pub struct StoresArgs {
    #[command(subcommand)]
    pub action: StoresAction,
}

#[derive(Subcommand, Debug)]
pub enum StoresAction {
    /// List stores and whether they belong to the current version
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the entries of one store
    Show {
        /// Store name
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete a store
    Clear {
        /// Store name
        name: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Plain,
}

/// Parse a NAME:VALUE header; the name is lowercased
fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid header '{}': expected NAME:VALUE", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid header '{}': empty name", s));
    }
    Ok((name.to_ascii_lowercase(), value.trim().to_string()))
}
