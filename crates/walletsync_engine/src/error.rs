//! Error types for the sync engine.

use thiserror::Error;
use walletsync_protocol::{LocalId, ProtocolError, RemoteId};

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by a local store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record not found.
    #[error("record {id} not found in collection {collection}")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Local record identifier.
        id: LocalId,
    },

    /// A record with this identifier already exists.
    #[error("record {id} already exists in collection {collection}")]
    AlreadyExists {
        /// Collection name.
        collection: String,
        /// Local record identifier.
        id: LocalId,
    },

    /// Record data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Errors raised by a remote backend adapter.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Network or transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("remote returned status {status}: {message}")]
    Status {
        /// HTTP-like status code.
        status: u16,
        /// Error body or message.
        message: String,
    },

    /// The backend rejected the request (constraint, permission, validation).
    #[error("remote rejected request: {0}")]
    Rejected(String),

    /// A row targeted by an update does not exist.
    #[error("row {id} not found in remote table {table}")]
    NotFound {
        /// Remote table name.
        table: String,
        /// Remote identifier.
        id: RemoteId,
    },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Returns true if retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network(_) => true,
            RemoteError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Errors raised by a checkpoint store.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// I/O failure.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted checkpoint file is malformed.
    #[error("checkpoint file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Local store failure.
    #[error("local store error: {0}")]
    Store(#[from] StoreError),

    /// Remote backend failure.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Checkpoint persistence failure.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A remote row or value could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Entity data could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A remote reference points at a record not present locally.
    #[error("unresolved reference: no local record in {table} for remote id {remote_id}")]
    UnresolvedReference {
        /// Remote table of the referenced entity.
        table: String,
        /// Remote identifier that could not be resolved.
        remote_id: RemoteId,
    },

    /// A local reference points at a record that has not been synced yet.
    #[error("missing remote id: record {local_id} in {table} has not been synced")]
    MissingRemoteId {
        /// Local collection of the referenced entity.
        table: String,
        /// Local identifier of the referenced record.
        local_id: LocalId,
    },

    /// Entity-specific mapping or validation failure.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Merge was requested for an entity without a merge hook.
    #[error("merge is not supported for {table}")]
    MergeUnsupported {
        /// Remote table name.
        table: String,
    },

    /// No engine or collection is registered under this name.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A table was registered twice.
    #[error("table registered twice: {0}")]
    DuplicateTable(String),

    /// An engine was registered before an engine it references.
    #[error("{table} references {dependency}, which must be registered first")]
    OutOfOrder {
        /// Table being registered.
        table: String,
        /// Referenced table that is missing.
        dependency: String,
    },
}

impl SyncError {
    /// Creates a mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    /// Returns true if this error can be retried on a later sync.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(e) => e.is_retryable(),
            SyncError::Checkpoint(CheckpointError::Io(_)) => true,
            SyncError::Store(StoreError::Backend(_)) => true,
            // The referent may be synced by a later run of its own engine.
            SyncError::UnresolvedReference { .. } | SyncError::MissingRemoteId { .. } => true,
            _ => false,
        }
    }

    /// Returns true if this error signals that a referenced entity was not
    /// synced before the entity referencing it.
    pub fn is_ordering_violation(&self) -> bool {
        matches!(
            self,
            SyncError::UnresolvedReference { .. }
                | SyncError::MissingRemoteId { .. }
                | SyncError::OutOfOrder { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::from(RemoteError::Network("connection reset".into())).is_retryable());
        assert!(SyncError::from(RemoteError::Status {
            status: 503,
            message: "unavailable".into()
        })
        .is_retryable());
        assert!(!SyncError::from(RemoteError::Status {
            status: 400,
            message: "bad request".into()
        })
        .is_retryable());
        assert!(!SyncError::mapping("bad color").is_retryable());
    }

    #[test]
    fn ordering_violations() {
        let err = SyncError::MissingRemoteId {
            table: "currencies".into(),
            local_id: LocalId::new("l-1"),
        };
        assert!(err.is_ordering_violation());
        assert!(err.to_string().contains("currencies"));
        assert!(!SyncError::UnknownTable("x".into()).is_ordering_violation());
    }
}
