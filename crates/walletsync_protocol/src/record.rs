//! Local record envelope.

use crate::ids::{LocalId, RemoteId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record held in the local store together with its sync metadata.
///
/// # Invariants
///
/// - `remote_id == None` means the record was never pushed; pushing it is
///   an insert. With a remote id, pushing is an update.
/// - `dirty == false` means `data` equals the last-known remote state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord<T> {
    /// Store-assigned identifier.
    pub id: LocalId,
    /// Server identifier, once the record has been created remotely.
    #[serde(default)]
    pub remote_id: Option<RemoteId>,
    /// Whether local changes are waiting to be pushed.
    #[serde(default)]
    pub dirty: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last local modification time.
    pub updated_at: DateTime<Utc>,
    /// `updated_at` of the remote state this record was last reconciled with.
    #[serde(default)]
    pub remote_updated_at: Option<DateTime<Utc>>,
    /// Entity fields.
    pub data: T,
}

/// A record with untyped entity data, as held by the store.
pub type RawRecord = LocalRecord<serde_json::Value>;

impl<T> LocalRecord<T> {
    /// Creates a new, never-synced, dirty record.
    pub fn new(data: T, now: DateTime<Utc>) -> Self {
        Self {
            id: LocalId::generate(),
            remote_id: None,
            dirty: true,
            created_at: now,
            updated_at: now,
            remote_updated_at: None,
            data,
        }
    }

    /// Returns true if the record was never confirmed on the remote.
    pub fn is_new(&self) -> bool {
        self.remote_id.is_none()
    }

    /// Applies a local edit and marks the record dirty.
    pub fn touch(&mut self, now: DateTime<Utc>, edit: impl FnOnce(&mut T)) {
        edit(&mut self.data);
        self.dirty = true;
        self.updated_at = now;
    }

    /// Maps the entity data, keeping the metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LocalRecord<U> {
        LocalRecord {
            id: self.id,
            remote_id: self.remote_id,
            dirty: self.dirty,
            created_at: self.created_at,
            updated_at: self.updated_at,
            remote_updated_at: self.remote_updated_at,
            data: f(self.data),
        }
    }
}

impl<T: Serialize> LocalRecord<T> {
    /// Converts into a raw record for storage.
    pub fn into_raw(self) -> serde_json::Result<RawRecord> {
        let LocalRecord {
            id,
            remote_id,
            dirty,
            created_at,
            updated_at,
            remote_updated_at,
            data,
        } = self;
        Ok(LocalRecord {
            id,
            remote_id,
            dirty,
            created_at,
            updated_at,
            remote_updated_at,
            data: serde_json::to_value(data)?,
        })
    }
}

impl RawRecord {
    /// Decodes the entity data into a typed record.
    pub fn decode<T: DeserializeOwned>(self) -> serde_json::Result<LocalRecord<T>> {
        let LocalRecord {
            id,
            remote_id,
            dirty,
            created_at,
            updated_at,
            remote_updated_at,
            data,
        } = self;
        Ok(LocalRecord {
            id,
            remote_id,
            dirty,
            created_at,
            updated_at,
            remote_updated_at,
            data: serde_json::from_value(data)?,
        })
    }

    /// Reads a top-level data field.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.data.get(name)
    }
}
