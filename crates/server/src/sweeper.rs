//! Background cache maintenance.

use std::sync::Arc;
use std::time::Duration;

use reducer_core::CacheStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Drop expired entries, then trim to `max_entries` (0 = unbounded).
pub async fn sweep(store: &dyn CacheStore, max_entries: usize) {
    match store.purge_expired().await {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "purged expired cache entries"),
        Err(e) => tracing::warn!(error = %e, "expired entry purge failed"),
    }

    if max_entries == 0 {
        return;
    }
    match store.purge_oldest(max_entries).await {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, max_entries, "trimmed cache to entry cap"),
        Err(e) => tracing::warn!(error = %e, "cache trim failed"),
    }
}

/// Run [`sweep`] every `interval` until the task is aborted.
pub fn spawn(store: Arc<dyn CacheStore>, interval: Duration, max_entries: usize) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(store.as_ref(), max_entries).await;
        }
    })
}
