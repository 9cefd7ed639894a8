//! Progress indicators with CI fallback

use super::context::UiContext;
use crate::engine::{ProgressStatus, ResourceProgress};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a new spinner (shows once started in interactive mode)
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = ProgressBar::new_spinner();
            if let Ok(template) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
                spinner.set_style(template.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            spinner.set_message(message.to_string());
            spinner.enable_steady_tick(Duration::from_millis(120));
            self.spinner = Some(spinner);
        } else {
            eprintln!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        self.finish_with(style("✓").green(), style("[OK]").green(), message);
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        self.finish_with(style("✗").red(), style("[FAIL]").red(), message);
    }

    fn finish_with(
        &mut self,
        symbol: console::StyledObject<&str>,
        plain: console::StyledObject<&str>,
        message: &str,
    ) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        if self.interactive {
            eprintln!("  {} {}", symbol, message);
        } else {
            eprintln!("{} {}", plain, message);
        }
    }
}

/// One progress bar per resource during an orchestrator run
///
/// Fed from the engine's progress observer. Bars show the advisory percent;
/// in plain mode every status change is printed as a line instead.
pub struct ScanProgress {
    interactive: bool,
    current: Mutex<Option<(String, ProgressBar)>>,
    last_plain: Mutex<Option<(String, ProgressStatus)>>,
}

impl ScanProgress {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            interactive: ctx.use_fancy_output(),
            current: Mutex::new(None),
            last_plain: Mutex::new(None),
        }
    }

    /// Reflect one progress update
    pub fn update(&self, progress: &ResourceProgress) {
        if self.interactive {
            self.update_bar(progress);
        } else {
            self.update_plain(progress);
        }
    }

    fn update_bar(&self, progress: &ResourceProgress) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };

        let same_resource = matches!(&*current, Some((name, _)) if *name == progress.resource);
        if !same_resource {
            if let Some((_, bar)) = current.take() {
                bar.abandon();
            }
            *current = Some((progress.resource.clone(), Self::new_bar(&progress.resource)));
        }

        let Some((_, bar)) = current.as_ref() else {
            return;
        };
        bar.set_position(u64::from(progress.percent));
        bar.set_message(describe(progress));

        if progress.status != ProgressStatus::Fetching {
            bar.abandon();
            *current = None;
        }
    }

    fn new_bar(resource: &str) -> ProgressBar {
        let bar = ProgressBar::new(100);
        if let Ok(template) = ProgressStyle::default_bar()
            .template("  {spinner:.cyan} {prefix:<10} {bar:24.cyan/dim} {pos:>3}% {msg:.dim}  {elapsed:.dim}")
        {
            bar.set_style(template.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ").progress_chars("━╸─"));
        }
        bar.set_prefix(resource.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }

    fn update_plain(&self, progress: &ResourceProgress) {
        let Ok(mut last) = self.last_plain.lock() else {
            return;
        };

        let key = (progress.resource.clone(), progress.status);
        let changed = last.as_ref() != Some(&key);
        // Page updates while fetching are printed too, but status repeats are not
        if changed || progress.status == ProgressStatus::Fetching {
            eprintln!("  {} {}", progress.resource, describe(progress));
        }
        *last = Some(key);
    }

    /// Clear any bar still on screen
    pub fn finish(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some((_, bar)) = current.take() {
                bar.finish_and_clear();
            }
        }
    }
}

fn describe(progress: &ResourceProgress) -> String {
    match progress.status {
        ProgressStatus::Error => format!(
            "error after {} records: {}",
            progress.count,
            progress.error.as_deref().unwrap_or("unknown")
        ),
        status => format!("{} {} records, page {}", status, progress.count, progress.pages),
    }
}
