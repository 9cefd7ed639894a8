//! Run command - scan resources in priority order

use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::Config;
use crate::engine::{quiet, OrchestratorReport, ProgressObserver, ProgressStatus, ResourceProgress};
use crate::error::{MirrorError, MirrorResult};
use crate::service::MirrorService;
use crate::ui::{self, ScanProgress, UiContext};
use console::style;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> MirrorResult<()> {
    let ctx = UiContext::detect();
    let service = MirrorService::from_config(config).await?;
    let show_progress = args.format == OutputFormat::Table;

    if show_progress {
        let title = if args.refresh {
            "Refreshing resources"
        } else {
            "Mirroring resources"
        };
        ui::intro(&ctx, title);
    }

    let progress = ScanProgress::new(&ctx);
    let on_progress = |update: &ResourceProgress| progress.update(update);
    let observer: &ProgressObserver<'_> = if show_progress { &on_progress } else { &quiet };

    let report = service
        .orchestrate_with(&args.resources, args.refresh, observer)
        .await;
    progress.finish();
    service.shutdown().await;
    let report = report?;

    match args.format {
        OutputFormat::Table => print_table(&ctx, &report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => {
            for summary in &report.resources {
                println!("{} {} {}", summary.name, summary.status, summary.count);
            }
        }
    }

    let failed: Vec<_> = report.failed().collect();
    match failed.first() {
        None => Ok(()),
        Some(first) => Err(MirrorError::FetchFailed {
            resource: failed
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            reason: first.error.clone().unwrap_or_else(|| "unknown error".to_string()),
        }),
    }
}

fn print_table(ctx: &UiContext, report: &OrchestratorReport) {
    println!();
    println!(
        "{:<14} {:<10} {:>8} {:>6} {:>9}  {}",
        style("RESOURCE").bold(),
        style("STATUS").bold(),
        style("RECORDS").bold(),
        style("PAGES").bold(),
        style("PROGRESS").bold(),
        style("NOTE").bold()
    );
    println!("{}", "-".repeat(68));

    for summary in &report.resources {
        let status = match summary.status {
            ProgressStatus::Complete => style("complete").green(),
            ProgressStatus::Paused => style("paused").yellow(),
            ProgressStatus::Error => style("error").red(),
            ProgressStatus::Fetching => style("fetching").cyan(),
            ProgressStatus::Idle => style("idle").dim(),
        };
        let note = if summary.skipped {
            "locked by another runner".to_string()
        } else {
            summary.error.clone().unwrap_or_default()
        };

        println!(
            "{:<14} {:<10} {:>8} {:>6} {:>8}%  {}",
            summary.name, status, summary.count, summary.pages, summary.progress, note
        );
    }

    let elapsed = report.finished_at - report.started_at;
    let complete = report
        .resources
        .iter()
        .filter(|r| r.status == ProgressStatus::Complete)
        .count();
    let message = format!(
        "{}/{} resources complete in {:.1}s",
        complete,
        report.resources.len(),
        elapsed.num_milliseconds() as f64 / 1000.0
    );

    if report.all_complete() {
        ui::outro_success(ctx, &message);
    } else if report.failed().next().is_some() {
        ui::outro_error(ctx, &message);
    } else {
        ui::outro_warn(ctx, &message);
    }
}
