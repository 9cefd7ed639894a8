//! Terminal output for the CLI
//!
//! Styled output and progress bars in interactive terminals, plain
//! line-oriented output in CI and when piped.
//!
//! # Example
//!
//! ```rust,ignore
//! use mirrorcache::ui::{self, ScanProgress, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "Mirroring resources");
//!
//! let progress = ScanProgress::new(&ctx);
//! let report = service.orchestrate_with(&[], false, &|p| progress.update(p)).await?;
//! progress.finish();
//!
//! ui::outro_success(&ctx, "All resources complete");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_error, outro_success, outro_warn, remark, section,
    step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::{ScanProgress, TaskSpinner};
