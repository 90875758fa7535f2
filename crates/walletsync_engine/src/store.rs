//! Local store adapter contract.
//!
//! The engine does not own local persistence. It needs three things from the
//! store: equality queries over a named collection, point reads, and an
//! atomic write transaction. Writes are staged in a [`WriteBatch`] and
//! applied all-or-nothing by [`LocalStore::commit`].

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use walletsync_protocol::{LocalId, PendingDeletion, RawRecord, RemoteId};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// An equality predicate over a local record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    /// Local identifier equals.
    Id(LocalId),
    /// Remote identifier equals.
    RemoteId(RemoteId),
    /// Dirty flag equals.
    Dirty(bool),
    /// A top-level data field equals.
    Field {
        /// Field name.
        name: String,
        /// Expected value.
        value: Value,
    },
}

impl FieldFilter {
    /// Creates a data field predicate.
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns true if the record satisfies this predicate.
    pub fn matches(&self, record: &RawRecord) -> bool {
        match self {
            FieldFilter::Id(id) => &record.id == id,
            FieldFilter::RemoteId(remote_id) => record.remote_id.as_ref() == Some(remote_id),
            FieldFilter::Dirty(dirty) => record.dirty == *dirty,
            FieldFilter::Field { name, value } => record.field(name) == Some(value),
        }
    }
}

/// A single staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a new record. Fails if the id exists.
    Create {
        /// Collection name.
        collection: String,
        /// Record to insert.
        record: RawRecord,
    },
    /// Replace an existing record. Fails if the id is absent.
    Update {
        /// Collection name.
        collection: String,
        /// Replacement record.
        record: RawRecord,
    },
    /// Permanently remove a record. Removing an absent record is a no-op.
    Destroy {
        /// Collection name.
        collection: String,
        /// Local identifier.
        id: LocalId,
    },
    /// Record the outcome of a successful push.
    ///
    /// Sets `remote_id` and `remote_updated_at`. The dirty flag is cleared
    /// only if the record's `updated_at` still equals `seen_updated_at`, so
    /// an edit made while the push was in flight stays pending. A missing
    /// record is a no-op.
    MarkSynced {
        /// Collection name.
        collection: String,
        /// Local identifier.
        id: LocalId,
        /// Remote identifier returned by the backend.
        remote_id: RemoteId,
        /// Remote modification time returned by the backend.
        remote_updated_at: Option<DateTime<Utc>>,
        /// `updated_at` of the record when it was read for pushing.
        seen_updated_at: DateTime<Utc>,
    },
    /// Replace a record with its pulled remote state.
    ///
    /// Applies only if the stored record still has the `updated_at` and
    /// dirty flag it had when it was read, so a local edit committed while
    /// the pull was running is kept. A skipped or missing record is a no-op.
    ApplyRemote {
        /// Collection name.
        collection: String,
        /// Replacement record.
        record: RawRecord,
        /// `updated_at` of the record when it was read for pulling.
        seen_updated_at: DateTime<Utc>,
        /// Dirty flag of the record when it was read for pulling.
        seen_dirty: bool,
    },
    /// Add a deletion ledger entry.
    EnqueueDeletion(PendingDeletion),
    /// Remove a deletion ledger entry. Removing an absent entry is a no-op.
    ClearDeletion(LocalId),
}

/// A set of writes applied as one atomic transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a record insert.
    pub fn create(&mut self, collection: impl Into<String>, record: RawRecord) -> &mut Self {
        self.ops.push(WriteOp::Create {
            collection: collection.into(),
            record,
        });
        self
    }

    /// Stages a record replacement.
    pub fn update(&mut self, collection: impl Into<String>, record: RawRecord) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.into(),
            record,
        });
        self
    }

    /// Stages a guarded replacement from remote state.
    pub fn apply_remote(
        &mut self,
        collection: impl Into<String>,
        record: RawRecord,
        seen_updated_at: DateTime<Utc>,
        seen_dirty: bool,
    ) -> &mut Self {
        self.ops.push(WriteOp::ApplyRemote {
            collection: collection.into(),
            record,
            seen_updated_at,
            seen_dirty,
        });
        self
    }

    /// Stages a permanent removal.
    pub fn destroy(&mut self, collection: impl Into<String>, id: LocalId) -> &mut Self {
        self.ops.push(WriteOp::Destroy {
            collection: collection.into(),
            id,
        });
        self
    }

    /// Stages an arbitrary operation.
    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Stages a deletion ledger entry.
    pub fn enqueue_deletion(&mut self, entry: PendingDeletion) -> &mut Self {
        self.ops.push(WriteOp::EnqueueDeletion(entry));
        self
    }

    /// Stages removal of a deletion ledger entry.
    pub fn clear_deletion(&mut self, id: LocalId) -> &mut Self {
        self.ops.push(WriteOp::ClearDeletion(id));
        self
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns the staged operations.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the batch, returning its operations.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// The local store contract required by the engine.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Returns every record of `collection` matching all filters.
    async fn query(&self, collection: &str, filters: &[FieldFilter]) -> StoreResult<Vec<RawRecord>>;

    /// Reads one record by local identifier.
    async fn get(&self, collection: &str, id: &LocalId) -> StoreResult<Option<RawRecord>> {
        Ok(self
            .query(collection, &[FieldFilter::Id(id.clone())])
            .await?
            .into_iter()
            .next())
    }

    /// Returns deletion ledger entries for a remote table, oldest first.
    async fn pending_deletions(&self, table: &str) -> StoreResult<Vec<PendingDeletion>>;

    /// Applies a batch atomically: either every operation applies or none.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}
