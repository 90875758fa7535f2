//! Typed collection handles and the table registry.

use crate::error::{SyncError, SyncResult};
use crate::store::{FieldFilter, LocalStore, WriteBatch};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use walletsync_protocol::{LocalId, LocalRecord, RemoteId};

/// Maps remote table names to local collection names.
///
/// Built once at startup; engines and reference lookups resolve through it.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    by_remote: BTreeMap<String, String>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a remote table and its local collection.
    pub fn register(
        &mut self,
        remote_table: impl Into<String>,
        local_collection: impl Into<String>,
    ) -> SyncResult<()> {
        let remote_table = remote_table.into();
        if self.by_remote.contains_key(&remote_table) {
            return Err(SyncError::DuplicateTable(remote_table));
        }
        self.by_remote.insert(remote_table, local_collection.into());
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(
        mut self,
        remote_table: impl Into<String>,
        local_collection: impl Into<String>,
    ) -> SyncResult<Self> {
        self.register(remote_table, local_collection)?;
        Ok(self)
    }

    /// Returns the local collection for a remote table.
    pub fn local_for(&self, remote_table: &str) -> SyncResult<&str> {
        self.by_remote
            .get(remote_table)
            .map(String::as_str)
            .ok_or_else(|| SyncError::UnknownTable(remote_table.to_string()))
    }

    /// Returns true if the remote table is registered.
    pub fn contains(&self, remote_table: &str) -> bool {
        self.by_remote.contains_key(remote_table)
    }

    /// Iterates over `(remote table, local collection)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_remote.iter().map(|(r, l)| (r.as_str(), l.as_str()))
    }
}

/// A typed handle over one local collection.
///
/// Records are stored untyped; the handle encodes and decodes `T` with serde.
pub struct Collection<T> {
    name: String,
    store: Arc<dyn LocalStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).finish()
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Creates a handle for `name` in `store`.
    pub fn new(store: Arc<dyn LocalStore>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store,
            _marker: PhantomData,
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns every record matching the filters.
    pub async fn query(&self, filters: &[FieldFilter]) -> SyncResult<Vec<LocalRecord<T>>> {
        self.store
            .query(&self.name, filters)
            .await?
            .into_iter()
            .map(|raw| raw.decode().map_err(SyncError::from))
            .collect()
    }

    /// Returns every record.
    pub async fn all(&self) -> SyncResult<Vec<LocalRecord<T>>> {
        self.query(&[]).await
    }

    /// Returns records with pending local changes.
    pub async fn dirty(&self) -> SyncResult<Vec<LocalRecord<T>>> {
        self.query(&[FieldFilter::Dirty(true)]).await
    }

    /// Reads one record.
    pub async fn get(&self, id: &LocalId) -> SyncResult<Option<LocalRecord<T>>> {
        match self.store.get(&self.name, id).await? {
            Some(raw) => Ok(Some(raw.decode()?)),
            None => Ok(None),
        }
    }

    /// Finds the record synced under a remote identifier.
    pub async fn find_by_remote_id(&self, remote_id: &RemoteId) -> SyncResult<Option<LocalRecord<T>>> {
        Ok(self
            .query(&[FieldFilter::RemoteId(remote_id.clone())])
            .await?
            .into_iter()
            .next())
    }

    /// Creates a new local record, dirty and without a remote id.
    pub async fn create(&self, data: T, now: DateTime<Utc>) -> SyncResult<LocalRecord<T>>
    where
        T: Clone,
    {
        let record = LocalRecord::new(data, now);
        let mut batch = WriteBatch::new();
        batch.create(&self.name, record.clone().into_raw()?);
        self.store.commit(batch).await?;
        Ok(record)
    }

    /// Applies a local edit and marks the record dirty.
    pub async fn edit(
        &self,
        id: &LocalId,
        now: DateTime<Utc>,
        edit: impl FnOnce(&mut T) + Send,
    ) -> SyncResult<LocalRecord<T>>
    where
        T: Clone,
    {
        let mut record = self.get(id).await?.ok_or_else(|| crate::error::StoreError::NotFound {
            collection: self.name.clone(),
            id: id.clone(),
        })?;
        record.touch(now, edit);
        let mut batch = WriteBatch::new();
        batch.update(&self.name, record.clone().into_raw()?);
        self.store.commit(batch).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::TimeZone;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Label {
        name: String,
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn registry_lookup() {
        let registry = CollectionRegistry::new()
            .with("tags", "tags")
            .unwrap()
            .with("wallets", "local_wallets")
            .unwrap();
        assert_eq!(registry.local_for("wallets").unwrap(), "local_wallets");
        assert!(matches!(
            registry.local_for("budgets"),
            Err(SyncError::UnknownTable(_))
        ));
        assert!(matches!(
            registry.clone().with("tags", "x"),
            Err(SyncError::DuplicateTable(_))
        ));
    }

    #[tokio::test]
    async fn create_edit_and_find() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
        let labels: Collection<Label> = Collection::new(Arc::clone(&store), "labels");

        let created = labels.create(Label { name: "a".into() }, at(1)).await.unwrap();
        assert_eq!(labels.dirty().await.unwrap().len(), 1);

        let edited = labels
            .edit(&created.id, at(5), |l| l.name = "b".into())
            .await
            .unwrap();
        assert_eq!(edited.updated_at, at(5));
        assert_eq!(labels.get(&created.id).await.unwrap().unwrap().data.name, "b");
        assert!(labels
            .find_by_remote_id(&RemoteId::new("srv-9"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn edit_missing_record_fails() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
        let labels: Collection<Label> = Collection::new(store, "labels");
        let err = labels
            .edit(&LocalId::new("nope"), at(1), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
    }
}
