//! Remote backend adapter contract.
//!
//! This trait abstracts the network layer, allowing for different
//! implementations (REST over any HTTP client, in-memory for tests).

use crate::error::RemoteError;
use async_trait::async_trait;
use walletsync_protocol::{Query, RemoteId, RemoteRow};

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// The remote table contract required by the engine.
///
/// Deleted rows are expected to appear in a shared trash table
/// (`table_name`, `record_id`, `deleted_by`, `deleted_at`), readable with
/// [`select`](RemoteBackend::select) like any other table.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Selects rows of `table` matching the query.
    async fn select(&self, table: &str, query: &Query) -> RemoteResult<Vec<RemoteRow>>;

    /// Inserts a row and returns it as stored, including its `id`.
    async fn insert(&self, table: &str, payload: RemoteRow) -> RemoteResult<RemoteRow>;

    /// Updates the row with the given identifier and returns it as stored.
    async fn update(&self, table: &str, id: &RemoteId, payload: RemoteRow) -> RemoteResult<RemoteRow>;

    /// Deletes the row with the given identifier.
    ///
    /// Must be idempotent: deleting an absent row succeeds.
    async fn delete(&self, table: &str, id: &RemoteId) -> RemoteResult<()>;
}
