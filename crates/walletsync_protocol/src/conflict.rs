//! Conflict detection and resolution.

use crate::error::ProtocolError;
use crate::ids::{LocalId, RemoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A conflict between a dirty local record and an unseen remote update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Remote table name.
    pub table: String,
    /// Local record identifier.
    pub local_id: LocalId,
    /// Remote record identifier.
    pub remote_id: RemoteId,
    /// Local modification time.
    pub local_updated_at: DateTime<Utc>,
    /// Remote modification time.
    pub remote_updated_at: DateTime<Utc>,
    /// How the conflict was resolved.
    pub resolution: ConflictResolution,
}

/// Resolution for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Keep the local version; it is pushed in the next push phase.
    KeepLocal,
    /// Overwrite the local record with the remote version.
    AcceptRemote,
    /// Combine both with the entity's merge hook.
    Merge,
}

impl ConflictResolution {
    /// Returns the short name (`local`, `server`, `merge`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::KeepLocal => "local",
            ConflictResolution::AcceptRemote => "server",
            ConflictResolution::Merge => "merge",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ConflictResolution::KeepLocal),
            "server" | "remote" => Ok(ConflictResolution::AcceptRemote),
            "merge" => Ok(ConflictResolution::Merge),
            other => Err(ProtocolError::UnknownResolution(other.to_string())),
        }
    }
}

/// Engine-wide policy for resolving conflicts an entity does not decide itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Local changes always win.
    #[default]
    LocalWins,
    /// The server always wins.
    ServerWins,
    /// The more recently modified side wins; the server wins ties.
    LastWriteWins,
    /// Always combine with the entity's merge hook.
    Merge,
}

impl ConflictPolicy {
    /// Resolves a conflict given both modification times.
    pub fn resolve(
        &self,
        local_updated_at: DateTime<Utc>,
        remote_updated_at: DateTime<Utc>,
    ) -> ConflictResolution {
        match self {
            ConflictPolicy::LocalWins => ConflictResolution::KeepLocal,
            ConflictPolicy::ServerWins => ConflictResolution::AcceptRemote,
            ConflictPolicy::LastWriteWins => {
                if local_updated_at > remote_updated_at {
                    ConflictResolution::KeepLocal
                } else {
                    ConflictResolution::AcceptRemote
                }
            }
            ConflictPolicy::Merge => ConflictResolution::Merge,
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local" | "local_wins" => Ok(ConflictPolicy::LocalWins),
            "server" | "server_wins" => Ok(ConflictPolicy::ServerWins),
            "lww" | "last_write_wins" => Ok(ConflictPolicy::LastWriteWins),
            "merge" => Ok(ConflictPolicy::Merge),
            other => Err(ProtocolError::UnknownResolution(other.to_string())),
        }
    }
}
