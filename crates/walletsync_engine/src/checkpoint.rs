//! Durable per-entity sync checkpoints.

use crate::error::CheckpointError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Result type for checkpoint operations.
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// A string-keyed store of timestamps.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Reads a checkpoint.
    async fn get(&self, key: &str) -> CheckpointResult<Option<DateTime<Utc>>>;

    /// Writes a checkpoint.
    async fn set(&self, key: &str, at: DateTime<Utc>) -> CheckpointResult<()>;
}

/// In-memory checkpoints.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    values: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with values.
    pub fn with_values(values: BTreeMap<String, DateTime<Utc>>) -> Self {
        Self {
            values: Mutex::new(values),
        }
    }

    /// Returns every stored checkpoint.
    pub fn snapshot(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.values.lock().clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, key: &str) -> CheckpointResult<Option<DateTime<Utc>>> {
        Ok(self.values.lock().get(key).copied())
    }

    async fn set(&self, key: &str, at: DateTime<Utc>) -> CheckpointResult<()> {
        self.values.lock().insert(key.to_string(), at);
        Ok(())
    }
}

/// Checkpoints persisted as a JSON object in a single file.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileCheckpointStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileCheckpointStore {
    /// Opens the store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> CheckpointResult<BTreeMap<String, DateTime<Utc>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    async fn get(&self, key: &str) -> CheckpointResult<Option<DateTime<Utc>>> {
        Ok(self.load().await?.get(key).copied())
    }

    async fn set(&self, key: &str, at: DateTime<Utc>) -> CheckpointResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), at);

        let bytes = serde_json::to_vec_pretty(&values)?;
        let tmp = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryCheckpointStore::new();
        assert_eq!(store.get("last_sync_tags").await.unwrap(), None);

        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        store.set("last_sync_tags", at).await.unwrap();
        assert_eq!(store.get("last_sync_tags").await.unwrap(), Some(at));
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("checkpoints.json");
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 12, 30, 0).unwrap();

        let store = JsonFileCheckpointStore::new(&path);
        assert_eq!(store.get("last_sync_wallets").await.unwrap(), None);
        store.set("last_sync_wallets", at).await.unwrap();
        store.set("last_sync_tags", at).await.unwrap();

        let reopened = JsonFileCheckpointStore::new(&path);
        assert_eq!(reopened.get("last_sync_wallets").await.unwrap(), Some(at));
        assert_eq!(reopened.get("last_sync_tags").await.unwrap(), Some(at));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = JsonFileCheckpointStore::new(&path);
        assert!(matches!(
            store.get("last_sync_tags").await,
            Err(CheckpointError::Corrupt(_))
        ));
    }
}
