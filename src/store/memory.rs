//! In-memory record store for tests and ephemeral deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

use crate::error::Result;

use super::RecordStore;

/// A non-durable [`RecordStore`] backed by a concurrent map.
///
/// Entries track their last write time so the garbage-collection sweep
/// behaves the same as against the file store.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, Entry>,
}

struct Entry {
    record: Value,
    modified_at: DateTime<Utc>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrite the last-modified time of an existing record.
    #[cfg(test)]
    pub(crate) fn set_modified_at(&self, key: &str, when: DateTime<Utc>) {
        if let Some(mut entry) = self.records.get_mut(key) {
            entry.modified_at = when;
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.records.get(key).map(|entry| entry.record.clone())
    }

    async fn put(&self, key: &str, record: Value) -> Result<()> {
        self.records.insert(
            key.to_string(),
            Entry {
                record,
                modified_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Vec<String> {
        self.records.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn modified_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.records.get(key).map(|entry| entry.modified_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::new();
        store.put("key", json!({"count": 3})).await.unwrap();

        let value = store.get("key").await.unwrap();
        assert_eq!(value["count"], 3);
    }

    #[tokio::test]
    async fn test_get_absent_key() {
        let store = MemoryStore::new();
        assert!(store.get("missing").await.is_none());
        assert!(store.modified_at("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.put("key", json!(1)).await.unwrap();

        store.delete("key").await.unwrap();
        store.delete("key").await.unwrap();
        assert!(store.get("key").await.is_none());
    }

    #[tokio::test]
    async fn test_put_refreshes_modified_at() {
        let store = MemoryStore::new();
        store.put("key", json!(1)).await.unwrap();
        store.set_modified_at("key", Utc::now() - chrono::Duration::hours(2));

        store.put("key", json!(2)).await.unwrap();
        let modified = store.modified_at("key").await.unwrap();
        assert!(Utc::now() - modified < chrono::Duration::seconds(5));
    }
}
