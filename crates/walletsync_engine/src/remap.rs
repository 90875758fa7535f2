//! Foreign-key identifier remapping.
//!
//! Locally, reference fields hold the referenced record's local id; on the
//! wire they hold its remote id. Both directions fail loudly when the
//! referenced record has not been synced, which signals an ordering error
//! in the orchestrator rather than a value to paper over.

use crate::collection::CollectionRegistry;
use crate::error::{SyncError, SyncResult};
use crate::store::{FieldFilter, LocalStore};
use std::sync::Arc;
use walletsync_protocol::{LocalId, RemoteId};

/// Resolves references between local and remote identifiers.
///
/// Tables are named by their remote table name in both directions; the
/// registry supplies the local collection.
#[derive(Clone)]
pub struct RefResolver {
    store: Arc<dyn LocalStore>,
    registry: Arc<CollectionRegistry>,
    user_id: String,
}

impl RefResolver {
    /// Creates a resolver for one sync run.
    pub fn new(
        store: Arc<dyn LocalStore>,
        registry: Arc<CollectionRegistry>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            user_id: user_id.into(),
        }
    }

    /// Returns the user the current sync runs for.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Looks up the local id of the record synced under `remote_id`.
    ///
    /// Returns `Ok(None)` when no such record exists locally.
    pub async fn lookup_local(&self, table: &str, remote_id: &RemoteId) -> SyncResult<Option<LocalId>> {
        let collection = self.registry.local_for(table)?;
        Ok(self
            .store
            .query(collection, &[FieldFilter::RemoteId(remote_id.clone())])
            .await?
            .into_iter()
            .next()
            .map(|record| record.id))
    }

    /// Looks up the remote id of a local record.
    ///
    /// Returns `Ok(None)` when the record is absent or has never been pushed.
    pub async fn lookup_remote(&self, table: &str, local_id: &LocalId) -> SyncResult<Option<RemoteId>> {
        let collection = self.registry.local_for(table)?;
        Ok(self
            .store
            .get(collection, local_id)
            .await?
            .and_then(|record| record.remote_id))
    }

    /// Translates a remote reference into a local id.
    pub async fn local_id_for(&self, table: &str, remote_id: &RemoteId) -> SyncResult<LocalId> {
        self.lookup_local(table, remote_id)
            .await?
            .ok_or_else(|| SyncError::UnresolvedReference {
                table: table.to_string(),
                remote_id: remote_id.clone(),
            })
    }

    /// Translates a local reference into a remote id.
    pub async fn remote_id_for(&self, table: &str, local_id: &LocalId) -> SyncResult<RemoteId> {
        self.lookup_remote(table, local_id)
            .await?
            .ok_or_else(|| SyncError::MissingRemoteId {
                table: table.to_string(),
                local_id: local_id.clone(),
            })
    }

    /// Like [`local_id_for`](Self::local_id_for) for nullable references.
    pub async fn local_id_for_opt(
        &self,
        table: &str,
        remote_id: Option<&RemoteId>,
    ) -> SyncResult<Option<LocalId>> {
        match remote_id {
            Some(remote_id) => self.local_id_for(table, remote_id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Like [`remote_id_for`](Self::remote_id_for) for nullable references.
    pub async fn remote_id_for_opt(
        &self,
        table: &str,
        local_id: Option<&LocalId>,
    ) -> SyncResult<Option<RemoteId>> {
        match local_id {
            Some(local_id) => self.remote_id_for(table, local_id).await.map(Some),
            None => Ok(None),
        }
    }
}
