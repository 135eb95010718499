//! Durable storage for limiter and budget records.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;

/// Key-value storage for counter and budget records.
///
/// Implementations must never fail a read: a record that cannot be read or
/// parsed is reported as absent, so the caller falls back to a fresh record.
/// Callers on different keys must not block one another.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record stored under `key`, or `None` if absent or unreadable.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Persist `record` under `key`, replacing any previous value.
    async fn put(&self, key: &str, record: Value) -> Result<()>;

    /// Remove the record stored under `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerate every stored key.
    async fn list_keys(&self) -> Vec<String>;

    /// When the record under `key` was last written, or `None` if absent.
    async fn modified_at(&self, key: &str) -> Option<DateTime<Utc>>;
}

/// Delete every record whose key contains `fragment`.
///
/// Returns the number of records removed. This backs per-user purges from
/// the admin surface.
pub async fn purge_matching(store: &dyn RecordStore, fragment: &str) -> usize {
    let mut removed = 0;
    for key in store.list_keys().await {
        if !key.contains(fragment) {
            continue;
        }
        match store.delete(&key).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(key = %key, error = %e, "Failed to delete record during purge"),
        }
    }
    removed
}

/// Read and deserialize the record under `key`.
///
/// Unreadable or shape-mismatched data is treated as absent.
pub(crate) async fn load<T: DeserializeOwned>(store: &dyn RecordStore, key: &str) -> Option<T> {
    let value = store.get(key).await?;
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(key = %key, error = %e, "Discarding unreadable record");
            None
        }
    }
}

/// Serialize `record` and write it under `key`.
///
/// Write failures are logged, never propagated: the in-memory decision that
/// prompted the write has already been made and still stands.
pub(crate) async fn persist<T: Serialize>(store: &dyn RecordStore, key: &str, record: &T) {
    match serde_json::to_value(record) {
        Ok(value) => {
            if let Err(e) = store.put(key, value).await {
                warn!(key = %key, error = %e, "Failed to persist record");
            }
        }
        Err(e) => warn!(key = %key, error = %e, "Failed to serialize record"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_purge_matching_removes_only_matching_keys() {
        let store = MemoryStore::new();
        store.put("rate_minute:alice:1.2.3.4", json!({"count": 1})).await.unwrap();
        store.put("tokens:alice", json!({"total": 10})).await.unwrap();
        store.put("tokens:bob", json!({"total": 20})).await.unwrap();

        let removed = purge_matching(&store, "alice").await;
        assert_eq!(removed, 2);

        let mut keys = store.list_keys().await;
        keys.sort();
        assert_eq!(keys, vec!["tokens:bob"]);
    }

    #[tokio::test]
    async fn test_purge_matching_without_matches() {
        let store = MemoryStore::new();
        store.put("tokens:alice", json!({"total": 10})).await.unwrap();

        assert_eq!(purge_matching(&store, "carol").await, 0);
        assert_eq!(store.list_keys().await.len(), 1);
    }
}
