//! Output functions for consistent CLI formatting

use super::context::UiContext;
use console::{style, Emoji, Style};

static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
static WARN: Emoji<'_, '_> = Emoji("!", "[WARN]");

/// Display intro banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        println!("{} {}", style("┌").cyan(), style(title).cyan().bold());
    } else {
        println!("{}", style(title).cyan().bold());
        println!();
    }
}

/// Display success outro
pub fn outro_success(ctx: &UiContext, message: &str) {
    outro(ctx, message, Style::new().green(), "[OK]");
}

/// Display error outro
pub fn outro_error(ctx: &UiContext, message: &str) {
    outro(ctx, message, Style::new().red(), "[ERROR]");
}

/// Display warning outro
pub fn outro_warn(ctx: &UiContext, message: &str) {
    outro(ctx, message, Style::new().yellow(), "[WARN]");
}

fn outro(ctx: &UiContext, message: &str, color: Style, plain_prefix: &str) {
    println!();
    if ctx.use_fancy_output() {
        println!("{} {}", style("└").cyan(), color.bold().apply_to(message));
    } else {
        println!("{} {}", color.apply_to(plain_prefix), message);
    }
}

/// Display a section header
pub fn section(_ctx: &UiContext, title: &str) {
    println!();
    println!("{}", style(title).bold());
}

/// Display a success step
pub fn step_ok(_ctx: &UiContext, message: &str) {
    println!("  {} {}", style(OK).green(), message);
}

/// Display a success step with detail
pub fn step_ok_detail(_ctx: &UiContext, message: &str, detail: &str) {
    println!("  {} {} ({})", style(OK).green(), message, style(detail).dim());
}

/// Display a warning step with hint
pub fn step_warn_hint(_ctx: &UiContext, message: &str, hint: &str) {
    println!("  {} {} - {}", style(WARN).yellow(), message, style(hint).dim());
}

/// Display a remark/hint
pub fn remark(_ctx: &UiContext, message: &str) {
    println!("  {}", style(message).dim());
}

/// Print styled key-value pair
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Print styled key-value with status color
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    let value_style = if ok {
        Style::new().green()
    } else {
        Style::new().yellow()
    };

    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value_style.apply_to(value));
    } else {
        let prefix = if ok { "[OK]" } else { "[WARN]" };
        println!("  {} {}: {}", prefix, key, value);
    }
}
