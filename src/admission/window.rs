//! Fixed-window request counting.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::store::{self, RecordStore};

/// Persistent state for one fixed window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Requests admitted in the current window
    pub count: u64,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
    /// When the first request of the current window arrived
    pub first_request: DateTime<Utc>,
}

/// Outcome of a side-effect-free window check.
#[derive(Debug, Clone)]
pub struct WindowCheck {
    /// Whether the request fits in the window
    pub within_limit: bool,
    /// Requests already admitted in the window, before this request
    pub current_count: u64,
    /// When the window ends
    pub reset_at: DateTime<Utc>,
}

/// A fixed-window limiter over a shared record store.
///
/// Windows do not slide: the counter resets entirely when `reset_at`
/// passes. An expired or unreadable record is treated as a fresh window.
///
/// [`check`](WindowLimiter::check) never mutates state;
/// [`record_hit`](WindowLimiter::record_hit) consumes quota and is called
/// only once the composite verdict comes back allowed, so a denied request
/// costs nothing.
pub struct WindowLimiter {
    store: Arc<dyn RecordStore>,
}

impl WindowLimiter {
    /// Create a limiter over `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn live_record(&self, key: &str, now: DateTime<Utc>) -> Option<CounterRecord> {
        store::load::<CounterRecord>(self.store.as_ref(), key)
            .await
            .filter(|record| now <= record.reset_at)
    }

    /// Evaluate `key` against a window of `window` length admitting `max`
    /// requests, without consuming quota.
    ///
    /// The comparison uses the pre-increment count, so a window admits
    /// exactly `max` requests before refusing.
    pub async fn check(&self, key: &str, window: Duration, max: u64) -> WindowCheck {
        let now = Utc::now();
        let (count, reset_at) = match self.live_record(key, now).await {
            Some(record) => (record.count, record.reset_at),
            None => (0, now + window),
        };

        trace!(key = %key, count, max, "Evaluated rate window");

        WindowCheck {
            within_limit: count < max,
            current_count: count,
            reset_at,
        }
    }

    /// Consume one slot of the window for `key`.
    ///
    /// If the window expired between check and commit, a fresh window
    /// starting at count one is written rather than incrementing the stale
    /// count.
    pub async fn record_hit(&self, key: &str, window: Duration) {
        let now = Utc::now();
        let record = match self.live_record(key, now).await {
            Some(record) => CounterRecord {
                count: record.count + 1,
                ..record
            },
            None => CounterRecord {
                count: 1,
                reset_at: now + window,
                first_request: now,
            },
        };
        store::persist(self.store.as_ref(), key, &record).await;
    }
}
