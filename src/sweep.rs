//! Time-based garbage collection of stale records.
//!
//! Limiter windows and budget records are created lazily and never deleted
//! on the request path, so an idle key would otherwise persist forever. The
//! sweep removes records whose last write is older than a retention
//! threshold. It runs on a fixed interval, independent of request traffic.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SweepConfig;
use crate::store::RecordStore;

/// Delete every record whose last write is older than `retention`.
///
/// Returns the number of records removed.
pub async fn sweep_once(store: &dyn RecordStore, retention: Duration) -> usize {
    let cutoff = Utc::now() - retention;
    let mut removed = 0;

    for key in store.list_keys().await {
        let stale = match store.modified_at(&key).await {
            Some(modified) => modified < cutoff,
            // Metadata unavailable: leave the record for a later pass
            None => false,
        };
        if !stale {
            continue;
        }
        match store.delete(&key).await {
            Ok(()) => {
                removed += 1;
                debug!(key = %key, "Swept stale record");
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to delete stale record"),
        }
    }

    if removed > 0 {
        info!(removed, "Garbage collection pass complete");
    }
    removed
}

/// Run collection passes forever, one per configured interval.
///
/// Spawn this on the embedding runtime and abort the task to stop:
///
/// ```no_run
/// # use std::sync::Arc;
/// # use turnstile::config::SweepConfig;
/// # use turnstile::store::MemoryStore;
/// # async fn example() {
/// let store = Arc::new(MemoryStore::new());
/// let handle = tokio::spawn(turnstile::sweep::run(store, SweepConfig::default()));
/// # handle.abort();
/// # }
/// ```
pub async fn run(store: Arc<dyn RecordStore>, config: SweepConfig) {
    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(config.interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let retention = Duration::seconds(config.retention_secs as i64);

    info!(
        interval_secs = config.interval_secs,
        retention_secs = config.retention_secs,
        "Starting garbage collection loop"
    );

    loop {
        ticker.tick().await;
        sweep_once(store.as_ref(), retention).await;
    }
}
