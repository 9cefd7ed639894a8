//! Mirrorcache - resumable cache population for paginated tables
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use mirrorcache::cli::{Cli, Commands};
use mirrorcache::config::ConfigManager;
use mirrorcache::error::MirrorResult;
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

async fn run() -> MirrorResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Loaded before logging so the configured log format applies
    let config = config_manager.load().await?;

    // 0 = warn (spinners only), 1 = info, 2+ = debug; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("mirrorcache=warn"),
        1 => EnvFilter::new("mirrorcache=info"),
        _ => EnvFilter::new("mirrorcache=debug"),
    });

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
    debug!("Using config {}", config_manager.path().display());

    ConfigManager::ensure_state_dirs().await?;

    match cli.command {
        Commands::Read(args) => mirrorcache::cli::commands::read(args, &config).await,
        Commands::Invalidate(args) => mirrorcache::cli::commands::invalidate(args, &config).await,
        Commands::Run(args) => mirrorcache::cli::commands::run(args, &config).await,
        Commands::Pause(args) => mirrorcache::cli::commands::pause(args, &config).await,
        Commands::Resume(args) => mirrorcache::cli::commands::resume(args, &config).await,
        Commands::Status(args) => mirrorcache::cli::commands::status(args, &config).await,
        Commands::Config(args) => {
            mirrorcache::cli::commands::config(args, &config_manager, &config).await
        }
    }
}
