//! Key-value storage backends
//!
//! The store sees persistence as a flat key -> JSON value namespace with
//! asynchronous, fallible operations. `MemoryBackend` backs tests and
//! ephemeral runs; `JsonFileBackend` is the durable default for the daemon.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::StorageError;

/// Asynchronous flat key-value persistence.
///
/// Any operation may fail with a [`StorageError`]; callers must treat failure
/// as "state unknown, do not assume success".
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fetch the values for `keys`. Missing keys are simply absent from the
    /// result map.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError>;

    /// Fetch every stored entry.
    async fn all(&self) -> Result<HashMap<String, Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key succeeds as a no-op.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Purely in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn all(&self) -> Result<HashMap<String, Value>, StorageError> {
        Ok(self.entries.lock().await.clone())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Single-file JSON backend.
///
/// The whole namespace lives in one JSON object, read once at open and
/// written through on every mutation. Writes go to a sibling temp file first
/// and are renamed into place, so a tick task cancelled mid-write cannot
/// truncate the state file.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

impl JsonFileBackend {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, Value>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(entries).map_err(|source| StorageError::Encode {
            key: self.path.display().to_string(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn all(&self) -> Result<HashMap<String, Value>, StorageError> {
        Ok(self.entries.lock().await.clone())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn memory_backend_round_trips() {
        let backend = MemoryBackend::new();
        backend.set("a", json!({"x": 1})).await.unwrap();
        backend.set("b", json!(2)).await.unwrap();

        let got = backend.get(&["a", "missing"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["a"], json!({"x": 1}));

        backend.remove("a").await.unwrap();
        assert!(backend.get(&["a"]).await.unwrap().is_empty());
        // removing again is a no-op
        backend.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let backend = JsonFileBackend::open(&path).await.unwrap();
            backend.set("example.com", json!({"isActive": true})).await.unwrap();
            backend.set("refocus_sites_list", json!(["example.com"])).await.unwrap();
            backend.remove("never-there").await.unwrap();
        }

        let reopened = JsonFileBackend::open(&path).await.unwrap();
        let all = reopened.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["example.com"], json!({"isActive": true}));
    }

    #[tokio::test]
    async fn file_backend_starts_empty_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::open(dir.path().join("absent.json")).await.unwrap();
        assert!(backend.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_backend_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        match JsonFileBackend::open(&path).await {
            Err(StorageError::Corrupt { .. }) => {}
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }
}
