//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Mirrorcache - resumable cache population for paginated tables
///
/// Mirrors source tables into a shared key-value store, one page at a
/// time, resuming interrupted scans where they stopped.
#[derive(Parser, Debug)]
#[command(name = "mirrorcache")]
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
    #[arg(short, long, global = true, env = "MIRRORCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a resource through the cache
    Read(ReadArgs),

    /// Drop the complete snapshot of a resource
    Invalidate(ResourceArgs),

    /// Scan resources in priority order
    Run(RunArgs),

    /// Pause a resource's scan at the next page boundary
    Pause(ResourceArgs),

    /// Clear a resource's pause flag
    Resume(ResourceArgs),

    /// Show cache state and progress of every resource
    Status(StatusArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// A single resource name
#[derive(Parser, Debug)]
pub struct ResourceArgs {
    /// Resource name as configured
    pub resource: String,
}

/// Arguments for the read command
#[derive(Parser, Debug)]
pub struct ReadArgs {
    /// Resource name as configured
    pub resource: String,

    /// Maximum number of items to return (0 = all)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Cursor returned by a previous read
    #[arg(long)]
    pub last_key: Option<String>,

    /// Purge the cached state before reading
    #[arg(long)]
    pub force_refresh: bool,

    /// Run one scan attempt before reading
    #[arg(long)]
    pub force_start: bool,

    /// Output format
    #[arg(short, long, default_value = "json")]
    pub format: OutputFormat,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Resources to scan, in this order (defaults to all by priority)
    pub resources: Vec<String>,

    /// Purge cached state first and scan from scratch
    #[arg(long)]
    pub refresh: bool,

    /// Output format for the final report
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
