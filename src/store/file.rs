//! File-per-key record store.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::Result;

use super::RecordStore;

/// A durable [`RecordStore`] that writes one JSON file per key.
///
/// Keys are sanitized into file names, so the keys reported by
/// [`RecordStore::list_keys`] are the sanitized forms. Sanitization is
/// idempotent: keys read back from `list_keys` address the same records.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize(key)))
    }
}

/// Map a record key to a file-name-safe form.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl RecordStore for FileStore {
    async fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(key = %key, error = %e, "Failed to read record, treating as absent");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupt record on disk, treating as absent");
                None
            }
        }
    }

    async fn put(&self, key: &str, record: Value) -> Result<()> {
        let contents = serde_json::to_string(&record)
            .map_err(|e| crate::error::AdmissionError::Storage(e.to_string()))?;
        fs::write(self.path_for(key), contents).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Failed to list store directory");
                return keys;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys
    }

    async fn modified_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let metadata = fs::metadata(self.path_for(key)).await.ok()?;
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.put("rate_minute:alice:1.2.3.4", json!({"count": 7})).await.unwrap();
        let value = store.get("rate_minute:alice:1.2.3.4").await.unwrap();
        assert_eq!(value["count"], 7);
    }

    #[tokio::test]
    async fn test_get_absent_key() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_treated_as_absent() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        assert!(store.get("broken").await.is_none());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::new(dir.path()).unwrap();
            store.put("tokens:alice", json!({"total": 42})).await.unwrap();
        }

        let reopened = FileStore::new(dir.path()).unwrap();
        let value = reopened.get("tokens:alice").await.unwrap();
        assert_eq!(value["total"], 42);
    }

    #[tokio::test]
    async fn test_list_keys_returns_sanitized_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.put("rate_ip:10.0.0.1", json!(1)).await.unwrap();
        store.put("tokens:bob", json!(2)).await.unwrap();

        let mut keys = store.list_keys().await;
        keys.sort();
        assert_eq!(keys, vec!["rate_ip_10.0.0.1", "tokens_bob"]);

        // Keys from list_keys address the same records
        assert!(store.get("tokens_bob").await.is_some());
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_ok() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_modified_at_tracks_writes() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.put("key", json!(1)).await.unwrap();
        let modified = store.modified_at("key").await.unwrap();
        assert!(Utc::now() - modified < chrono::Duration::seconds(5));
    }
}
