//! Read command - read a resource through the cache

use crate::cli::args::{OutputFormat, ReadArgs};
use crate::config::Config;
use crate::error::MirrorResult;
use crate::service::{MirrorService, ReadQuery, ReadResponse};
use crate::ui::{self, TaskSpinner, UiContext};
use console::style;

/// Execute the read command
pub async fn execute(args: ReadArgs, config: &Config) -> MirrorResult<()> {
    let ctx = UiContext::detect();
    let service = MirrorService::from_config(config).await?;

    let query = ReadQuery {
        limit: args.limit,
        last_key: args.last_key,
        force_refresh: args.force_refresh,
        force_start: args.force_start,
    };

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Reading {}...", args.resource));
    let response = match service.read_page(&args.resource, &query).await {
        Ok(response) => {
            spinner.stop(&format!("Read {} of {} records", response.items.len(), response.total));
            response
        }
        Err(e) => {
            spinner.stop_error(&format!("Failed to read {}", args.resource));
            return Err(e);
        }
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Plain => print_plain(&response)?,
        OutputFormat::Table => print_summary(&ctx, &args.resource, &response)?,
    }

    // The process must outlive scans continued in the background, or their
    // locks would stay held until they expire
    if service.pool().stats().running > 0 {
        eprintln!(
            "{}",
            style(format!("Continuing scan of {} in the background...", args.resource)).dim()
        );
    }
    service.shutdown().await;

    Ok(())
}

fn print_plain(response: &ReadResponse) -> MirrorResult<()> {
    for item in &response.items {
        println!("{}", serde_json::to_string(item)?);
    }
    Ok(())
}

fn print_summary(ctx: &UiContext, resource: &str, response: &ReadResponse) -> MirrorResult<()> {
    ui::intro(ctx, resource);
    print_plain(response)?;

    ui::section(ctx, "Summary");
    ui::key_value(ctx, "Items", &response.items.len().to_string());
    ui::key_value(ctx, "Total", &response.total.to_string());
    ui::key_value_status(
        ctx,
        "Snapshot",
        if response.is_complete { "complete" } else { "partial" },
        response.is_complete,
    );
    if let Some(ref key) = response.last_evaluated_key {
        ui::key_value(ctx, "Next", &format!("--last-key {}", key));
    }
    if response.total == 0 && !response.is_complete {
        ui::remark(ctx, "Nothing cached yet; a scan was started. Retry shortly.");
    }
    Ok(())
}
