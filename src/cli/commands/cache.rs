//! Cache command - inspect and maintain the cache pools

use crate::cache::{CacheEntry, CacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{RepoCacheError, RepoCacheResult};
use crate::ui::{self, UiContext};
use chrono::Utc;
use console::style;
use std::time::Duration;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> RepoCacheResult<()> {
    let store = CacheStore::from_config(&config.cache);

    match args.action {
        CacheAction::Init => init_pools(&store).await,
        CacheAction::Usage { format } => show_usage(&store, format).await,
        CacheAction::List { format } => list_entries(&store, format).await,
        CacheAction::Purge { dry_run } => purge(&store, dry_run).await,
    }
}

async fn init_pools(store: &CacheStore) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();
    store.initialize().await?;

    for pool in store.pools() {
        ui::step_ok(&ctx, &format!("{}: {}", pool.name, pool.root.display()));
    }
    Ok(())
}

async fn show_usage(store: &CacheStore, format: OutputFormat) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();
    let usage = store.usage().await?;

    match format {
        OutputFormat::Table => ui::usage_table(&ctx, &usage),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&usage)?),
        OutputFormat::Plain => {
            for pool in &usage.pools {
                println!("{}\t{}", pool.name, pool.bytes);
            }
            println!("total\t{}", usage.total_bytes);
        }
    }
    Ok(())
}

async fn list_entries(store: &CacheStore, format: OutputFormat) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();
    let mut entries = store.entries().await?;
    entries.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.path.display());
            }
        }
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("No cache entries found.");
                return Ok(());
            }
            let now = Utc::now();
            for entry in &entries {
                ui::entry_line(&ctx, entry, now);
            }
            let locked = entries.iter().filter(|e| e.locked).count();
            println!();
            println!("Total: {} entries ({} locked)", entries.len(), locked);
        }
    }
    Ok(())
}

async fn purge(store: &CacheStore, dry_run: bool) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();

    if dry_run {
        let candidates = store.purge_candidates().await?;
        print_candidates(&ctx, &candidates, store.purge_age());
        return Ok(());
    }

    let outcomes = store.purge().await;
    let mut failures = 0;
    let mut removed = 0;
    for outcome in &outcomes {
        removed += outcome.removed.len();
        for path in &outcome.removed {
            ui::step_info(&ctx, &format!("Removed {}", path.display()));
        }
        for e in &outcome.errors {
            failures += 1;
            ui::step_error_detail(
                &ctx,
                &format!("Purge of {} failed", outcome.pool),
                &e.to_string(),
            );
        }
    }

    ui::outro(&ctx, &format!("Purged {} entries", removed));
    if failures > 0 {
        return Err(RepoCacheError::User(format!(
            "Purge finished with {} failure(s)",
            failures
        )));
    }
    Ok(())
}

fn print_candidates(ctx: &UiContext, candidates: &[CacheEntry], purge_age: Duration) {
    if candidates.is_empty() {
        println!("Nothing to purge.");
        return;
    }

    let now = Utc::now();
    for entry in candidates {
        ui::entry_line(ctx, entry, now);
    }
    println!();
    println!(
        "{} {} entries would be removed",
        style("[DRY RUN]").yellow(),
        candidates.len()
    );
    ui::remark(
        ctx,
        &format!(
            "Unlocked entries idle for {} or more are purged",
            ui::format_idle(purge_age.as_secs())
        ),
    );
}
