//! Per-entity sync strategy.

use crate::error::{SyncError, SyncResult};
use crate::remap::RefResolver;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use walletsync_protocol::{ConflictResolution, LocalRecord, RemoteRow};

/// Describes how one entity type maps between the local store and the
/// remote backend.
///
/// Implemented once per entity and injected into a generic
/// [`SyncEngine`](crate::SyncEngine), which runs the sync protocol.
#[async_trait]
pub trait EntitySync: Send + Sync + 'static {
    /// Entity fields held in the local record.
    type Entity: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Local collection name.
    fn local_table(&self) -> &'static str;

    /// Remote table name.
    fn remote_table(&self) -> &'static str;

    /// Remote tables this entity references through foreign keys.
    ///
    /// The orchestrator requires these to be synced first.
    fn references(&self) -> &'static [&'static str] {
        &[]
    }

    /// Builds entity fields from a remote row.
    ///
    /// Must fail, rather than return a partial value, when a required
    /// reference cannot be resolved.
    async fn map_in(&self, row: &RemoteRow, refs: &RefResolver) -> SyncResult<Self::Entity>;

    /// Builds the outbound payload for a local record.
    ///
    /// Must fail when a referenced record has no remote id yet.
    async fn map_out(&self, record: &LocalRecord<Self::Entity>, refs: &RefResolver) -> SyncResult<RemoteRow>;

    /// Decides a conflict between a dirty local record and a remote update.
    ///
    /// `None` defers to the engine's [`ConflictPolicy`](walletsync_protocol::ConflictPolicy).
    fn resolve_conflict(
        &self,
        _local: &LocalRecord<Self::Entity>,
        _remote: &RemoteRow,
    ) -> Option<ConflictResolution> {
        None
    }

    /// Combines a dirty local record with a remote update.
    ///
    /// Only called when a conflict resolves to [`ConflictResolution::Merge`].
    async fn merge(
        &self,
        _local: &LocalRecord<Self::Entity>,
        _remote: &RemoteRow,
        _refs: &RefResolver,
    ) -> SyncResult<Self::Entity> {
        Err(SyncError::MergeUnsupported {
            table: self.remote_table().to_string(),
        })
    }
}
