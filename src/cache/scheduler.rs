//! Periodic background purge of the cache pools

use crate::cache::store::CacheStore;
use crate::error::{RepoCacheError, RepoCacheResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info};

/// Runs [`CacheStore::purge`] on a fixed interval until stopped
pub struct PurgeScheduler {
    store: Arc<CacheStore>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PurgeScheduler {
    /// Create a stopped scheduler
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            task: Mutex::new(None),
        }
    }

    /// Start purging every `interval`. The first purge runs one interval
    /// from now. Returns `false` if the scheduler was already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, interval: Duration) -> RepoCacheResult<bool> {
        if interval.is_zero() {
            return Err(RepoCacheError::invalid_field(
                "purge_interval_ms",
                "must be greater than zero",
            ));
        }

        let mut task = self.task();
        if task.is_some() {
            return Ok(false);
        }

        let store = Arc::clone(&self.store);
        *task = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for outcome in store.purge().await {
                    if !outcome.is_ok() {
                        error!(
                            "Scheduled purge of {} had {} failure(s)",
                            outcome.pool,
                            outcome.errors.len()
                        );
                    }
                }
            }
        }));

        info!(
            "Cache purge interval set with duration of {} ms",
            interval.as_millis()
        );
        Ok(true)
    }

    /// Stop the periodic purge. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        match self.task().take() {
            Some(handle) => {
                info!("Clearing cache purge interval");
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether the periodic purge is active
    pub fn is_running(&self) -> bool {
        self.task().is_some()
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PurgeScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
