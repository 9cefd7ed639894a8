//! Invalidate command - drop a resource's complete snapshot

use crate::cli::args::ResourceArgs;
use crate::config::Config;
use crate::error::MirrorResult;
use crate::service::{CacheAction, CacheActionRequest, MirrorService};
use crate::ui::{self, UiContext};

/// Execute the invalidate command
pub async fn execute(args: ResourceArgs, config: &Config) -> MirrorResult<()> {
    let ctx = UiContext::detect();
    let service = MirrorService::from_config(config).await?;

    let request = CacheActionRequest {
        action: CacheAction::Invalidate,
    };
    service.handle_action(&args.resource, request).await?;

    ui::step_ok(&ctx, &format!("Invalidated {}", args.resource));
    Ok(())
}
