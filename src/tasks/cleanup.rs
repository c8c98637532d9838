//! TTL Cleanup Task
//!
//! Background task that periodically sweeps stale entries out of every
//! registered cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::CacheRegistry;

/// Spawns a background task that runs `cleanup_expired` on every registered
/// cache each `cleanup_interval_secs` seconds.
///
/// Returns the task handle so it can be aborted during shutdown. Caches
/// registered after the task starts are picked up on the next sweep.
pub fn spawn_cleanup_task(
    registry: Arc<CacheRegistry>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = registry.cleanup_all();
            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
