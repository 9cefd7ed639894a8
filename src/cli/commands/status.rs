//! Status command - cache state and progress of every resource

use crate::cli::args::{OutputFormat, StatusArgs};
use crate::config::Config;
use crate::engine::ProgressStatus;
use crate::error::MirrorResult;
use crate::service::{MirrorService, ResourceStatus};
use crate::ui::{self, UiContext};
use console::style;

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> MirrorResult<()> {
    let service = MirrorService::from_config(config).await?;
    let statuses = service.status().await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statuses)?),
        OutputFormat::Plain => {
            for status in &statuses {
                println!("{} {} {}", status.name, status.cache, status.progress.status);
            }
        }
        OutputFormat::Table => print_table(&statuses),
    }

    Ok(())
}

fn print_table(statuses: &[ResourceStatus]) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Resources");

    println!(
        "{:<14} {:<16} {:<9} {:<10} {:>8} {:>5}  {}",
        style("RESOURCE").bold(),
        style("TABLE").bold(),
        style("CACHE").bold(),
        style("SCAN").bold(),
        style("RECORDS").bold(),
        style("PCT").bold(),
        style("FLAGS").bold()
    );
    println!("{}", "-".repeat(78));

    for status in statuses {
        let scan = match status.progress.status {
            ProgressStatus::Complete => style("complete").green(),
            ProgressStatus::Fetching => style("fetching").cyan(),
            ProgressStatus::Paused => style("paused").yellow(),
            ProgressStatus::Error => style("error").red(),
            ProgressStatus::Idle => style("idle").dim(),
        };

        println!(
            "{:<14} {:<16} {:<9} {:<10} {:>8} {:>4}%  {}",
            status.name,
            status.table,
            status.cache.to_string(),
            scan,
            status.progress.count,
            status.progress.percent,
            flags(status)
        );

        if let Some(ref error) = status.progress.error {
            println!("  {} {}", style("last error:").dim(), style(error).red());
        }
    }

    println!();
    println!("{} resource(s)", statuses.len());
}

fn flags(status: &ResourceStatus) -> String {
    let mut flags = Vec::new();
    if status.paused {
        flags.push("paused".to_string());
    }
    if status.resumable {
        flags.push("resumable".to_string());
    }
    if status.locked {
        flags.push("locked".to_string());
    }
    if let Some(chunks) = status.chunks {
        flags.push(format!("{} chunks", chunks.chunks));
    }
    flags.join(", ")
}
