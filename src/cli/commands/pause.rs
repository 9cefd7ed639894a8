//! Pause and resume commands

use crate::cli::args::ResourceArgs;
use crate::config::Config;
use crate::error::MirrorResult;
use crate::service::MirrorService;
use crate::ui::{self, UiContext};

/// Set the pause flag; a running scan stops at its next page boundary
pub async fn pause(args: ResourceArgs, config: &Config) -> MirrorResult<()> {
    let ctx = UiContext::detect();
    let service = MirrorService::from_config(config).await?;
    service.pause(&args.resource).await?;

    ui::step_ok(&ctx, &format!("Paused {}", args.resource));
    ui::remark(&ctx, "The scan position is kept; resume to continue from it");
    Ok(())
}

/// Clear the pause flag
pub async fn resume(args: ResourceArgs, config: &Config) -> MirrorResult<()> {
    let ctx = UiContext::detect();
    let service = MirrorService::from_config(config).await?;
    service.resume(&args.resource).await?;

    ui::step_ok(&ctx, &format!("Resumed {}", args.resource));
    ui::remark(
        &ctx,
        &format!("Run: mirrorcache run {} to continue the scan now", args.resource),
    );
    Ok(())
}
