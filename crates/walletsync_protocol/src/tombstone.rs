//! Deletion tombstones: remote trash rows and local pending deletions.

use crate::error::{ProtocolError, ProtocolResult};
use crate::ids::{LocalId, RemoteId};
use crate::row::RemoteRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the shared remote `trash` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashEntry {
    /// Remote table the deleted record belonged to.
    pub table_name: String,
    /// Remote identifier of the deleted record.
    pub record_id: RemoteId,
    /// User who deleted it.
    pub deleted_by: String,
    /// Deletion time.
    pub deleted_at: DateTime<Utc>,
}

impl TrashEntry {
    /// Decodes a trash table row.
    pub fn from_row(row: &RemoteRow) -> ProtocolResult<Self> {
        Ok(Self {
            table_name: row.str("table_name")?.to_string(),
            record_id: row
                .id_in("record_id")
                .ok_or_else(|| ProtocolError::missing("record_id"))?,
            deleted_by: row.str("deleted_by")?.to_string(),
            deleted_at: row.timestamp("deleted_at")?,
        })
    }

    /// Encodes as a trash table row.
    pub fn to_row(&self) -> RemoteRow {
        RemoteRow::new()
            .with("table_name", self.table_name.as_str())
            .with("record_id", self.record_id.as_str())
            .with("deleted_by", self.deleted_by.as_str())
            .with("deleted_at", crate::row::format_timestamp(self.deleted_at))
    }
}

/// A local deletion that has not yet been confirmed on the remote.
///
/// Created in the same write transaction that destroys the record, and
/// destroyed only once the remote delete succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeletion {
    /// Ledger entry identifier.
    pub id: LocalId,
    /// Remote table name.
    pub table_name: String,
    /// Remote identifier of the deleted record.
    pub remote_id: RemoteId,
    /// Local deletion time.
    pub deleted_at: DateTime<Utc>,
}

impl PendingDeletion {
    /// Creates a new ledger entry.
    pub fn new(table_name: impl Into<String>, remote_id: RemoteId, deleted_at: DateTime<Utc>) -> Self {
        Self {
            id: LocalId::generate(),
            table_name: table_name.into(),
            remote_id,
            deleted_at,
        }
    }
}
