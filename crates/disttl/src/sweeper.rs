//! Periodic reclamation of expired entries.
//!
//! Reads already hide expired entries; the sweep only frees memory held by
//! keys that are never read or written again.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::lru::TtlLru;

/// Default interval between full sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

/// Shortest interval the sweeper will tick at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Spawn a task that calls [`TtlLru::purge_expired`] every `interval`
/// until `shutdown` turns `true` or its sender is dropped.
///
/// `interval` is raised to [`MIN_SWEEP_INTERVAL`] if shorter.
pub fn spawn_expiry_sweeper<K, V>(
    cache: Arc<TtlLru<K, V>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; a fresh cache has nothing to purge.
        ticker.tick().await;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                result = shutdown.changed() => {
                    match result {
                        Ok(()) if *shutdown.borrow() => break,
                        Ok(()) => {}
                        Err(_) => break,
                    }
                }
                _ = ticker.tick() => {
                    let purged = cache.purge_expired();
                    let (current, max) = cache.size();
                    tracing::debug!(purged, current, max, "expired cache entries swept");
                }
            }
        }

        tracing::debug!("expiry sweeper stopped");
    })
}
