//! Status lines and cache reports

use super::context::UiContext;
use crate::cache::{format_bytes, CacheEntry, CacheUsage};
use chrono::{DateTime, Utc};
use console::style;

/// Display intro banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

/// Display closing line
pub fn outro(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("{} {}", style("[OK]").green(), message);
    }
}

/// Display a success step
pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        println!("  {} {}", style("[OK]").green(), message);
    }
}

/// Display an info step
pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        println!("  {} {}", style("[INFO]").cyan(), message);
    }
}

/// Display a warning step with hint
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(format!("{} - {}", message, style(hint).dim())).ok();
    } else {
        println!("  {} {} - {}", style("[WARN]").yellow(), message, hint);
    }
}

/// Display an error step with detail
pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::error(format!("{}: {}", message, style(detail).red())).ok();
    } else {
        println!("  {} {}: {}", style("[FAIL]").red(), message, detail);
    }
}

/// Display a remark/hint
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Print styled key-value pair
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Print per-pool disk usage followed by the total
pub fn usage_table(ctx: &UiContext, usage: &CacheUsage) {
    let width = usage.pools.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for pool in &usage.pools {
        let size = format_bytes(pool.bytes);
        if ctx.use_fancy_output() {
            println!(
                "  {:<width$}  {:>10}  {}",
                style(&pool.name).bold(),
                size,
                style(pool.path.display()).dim(),
                width = width
            );
        } else {
            println!(
                "  {:<width$}  {:>10}  {}",
                pool.name,
                size,
                pool.path.display(),
                width = width
            );
        }
    }
    println!(
        "  {:<width$}  {:>10}",
        "total",
        format_bytes(usage.total_bytes),
        width = width
    );
}

/// Print one cache entry: lock state, idle time, pool and path
pub fn entry_line(ctx: &UiContext, entry: &CacheEntry, now: DateTime<Utc>) {
    let idle = format_idle(entry.idle_for(now).as_secs());
    if ctx.use_fancy_output() {
        let state = if entry.locked {
            style("locked").yellow()
        } else {
            style("idle").dim()
        };
        println!(
            "  {:<6}  {:>8}  {:<12}  {}",
            state,
            idle,
            style(&entry.pool).dim(),
            entry.path.display()
        );
    } else {
        let state = if entry.locked { "locked" } else { "idle" };
        println!(
            "  {:<6}  {:>8}  {:<12}  {}",
            state,
            idle,
            entry.pool,
            entry.path.display()
        );
    }
}

/// Compact idle duration: `45s`, `12m`, `3h`, `2d`
pub fn format_idle(secs: u64) -> String {
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}
