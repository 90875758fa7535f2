//! Deletion ledger: durable queue of local deletions awaiting the remote.

use crate::clock::Clock;
use crate::collection::CollectionRegistry;
use crate::error::{StoreError, SyncResult};
use crate::store::{LocalStore, WriteBatch};
use std::sync::Arc;
use tracing::debug;
use walletsync_protocol::{LocalId, PendingDeletion, RemoteId};

/// Records and confirms pending deletions.
///
/// Every permanent local deletion of a record that has a remote id goes
/// through [`destroy`](Self::destroy), which removes the record and enqueues
/// its tombstone in one write transaction. The entry is removed only once
/// the remote delete succeeded.
#[derive(Clone)]
pub struct DeletionLedger {
    store: Arc<dyn LocalStore>,
    registry: Arc<CollectionRegistry>,
    clock: Arc<dyn Clock>,
}

impl DeletionLedger {
    /// Creates a ledger over the given store.
    pub fn new(
        store: Arc<dyn LocalStore>,
        registry: Arc<CollectionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Permanently deletes a local record.
    ///
    /// Returns the created ledger entry, or `None` if the record was never
    /// pushed (nothing to propagate).
    pub async fn destroy(&self, table: &str, id: &LocalId) -> SyncResult<Option<PendingDeletion>> {
        let collection = self.registry.local_for(table)?;
        let record = self
            .store
            .get(collection, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.clone(),
            })?;

        let mut batch = WriteBatch::new();
        batch.destroy(collection, id.clone());

        let entry = record
            .remote_id
            .map(|remote_id| PendingDeletion::new(table, remote_id, self.clock.now()));
        if let Some(entry) = &entry {
            batch.enqueue_deletion(entry.clone());
        }

        self.store.commit(batch).await?;
        debug!(table, local_id = %id, tombstone = entry.is_some(), "destroyed local record");
        Ok(entry)
    }

    /// Returns pending entries for a table, oldest first.
    pub async fn pending(&self, table: &str) -> SyncResult<Vec<PendingDeletion>> {
        Ok(self.store.pending_deletions(table).await?)
    }

    /// Returns true if a deletion of `remote_id` is waiting to be pushed.
    pub async fn is_pending(&self, table: &str, remote_id: &RemoteId) -> SyncResult<bool> {
        Ok(self
            .pending(table)
            .await?
            .iter()
            .any(|entry| &entry.remote_id == remote_id))
    }

    /// Removes confirmed entries in one transaction.
    pub async fn confirm(&self, entries: &[PendingDeletion]) -> SyncResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for entry in entries {
            batch.clear_deletion(entry.id.clone());
        }
        self.store.commit(batch).await?;
        Ok(())
    }
}
