//! Periodic removal of expired cache entries.

use scamguard_storage::ResultCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawn a task that sweeps `cache` every `every` until `shutdown` fires.
///
/// The first sweep runs one full interval after spawning. The handle
/// resolves to the total number of entries removed.
pub fn spawn_cache_sweeper(
    cache: Arc<ResultCache>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = every.as_secs(), "Cache sweeper started");
        let mut total = 0;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.sweep_expired();
                    total += removed;
                    debug!(removed, remaining = cache.len(), "Cache sweep cycle");
                }
            }
        }
        info!(removed_total = total, "Cache sweeper stopped");
        total
    })
}
