//! Daemon command - keep the caches purged until interrupted

use crate::cache::{CacheStore, PurgeScheduler};
use crate::cli::args::DaemonArgs;
use crate::config::Config;
use crate::error::{RepoCacheError, RepoCacheResult};
use crate::ui::{self, StatusLine, UiContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Execute the daemon command
pub async fn execute(args: DaemonArgs, config: &Config) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.cache.purge_interval());

    let store = Arc::new(CacheStore::from_config(&config.cache));
    store.initialize().await?;

    ui::intro(&ctx, "repocache daemon");
    for pool in store.pools() {
        ui::key_value(&ctx, &pool.name, &pool.root.display().to_string());
    }

    let scheduler = PurgeScheduler::new(Arc::clone(&store));
    scheduler.start(interval)?;

    let status = StatusLine::new(
        &ctx,
        &format!(
            "Purging every {}s, entries idle {} or more (Ctrl-C to stop)",
            interval.as_secs(),
            ui::format_idle(store.purge_age().as_secs())
        ),
    );

    let signal = tokio::signal::ctrl_c().await;
    status.finish();
    scheduler.stop();
    signal.map_err(|e| RepoCacheError::io("waiting for Ctrl-C", e))?;

    info!("Purge scheduler stopped");
    ui::outro(&ctx, "Stopped");
    Ok(())
}
