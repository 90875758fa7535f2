//! Configuration for the sync engine.

use walletsync_protocol::ConflictPolicy;

/// Configuration shared by every entity engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Name of the shared remote trash table.
    pub trash_table: String,
    /// Prefix of checkpoint keys; the remote table name is appended.
    pub checkpoint_prefix: String,
    /// Column set to the syncing user on inserts, if any.
    pub owner_column: Option<String>,
    /// Remote identifier column.
    pub id_column: String,
    /// Remote modification time column.
    pub updated_at_column: String,
    /// Policy for conflicts an entity does not resolve itself.
    pub conflict_policy: ConflictPolicy,
}

impl SyncConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            trash_table: "trash".into(),
            checkpoint_prefix: "last_sync_".into(),
            owner_column: Some("user_id".into()),
            id_column: "id".into(),
            updated_at_column: "updated_at".into(),
            conflict_policy: ConflictPolicy::LocalWins,
        }
    }

    /// Sets the trash table name.
    pub fn with_trash_table(mut self, table: impl Into<String>) -> Self {
        self.trash_table = table.into();
        self
    }

    /// Sets the checkpoint key prefix.
    pub fn with_checkpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.checkpoint_prefix = prefix.into();
        self
    }

    /// Sets the owner column, or disables it with `None`.
    pub fn with_owner_column(mut self, column: Option<&str>) -> Self {
        self.owner_column = column.map(str::to_string);
        self
    }

    /// Sets the conflict policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Returns the checkpoint key for a remote table.
    pub fn checkpoint_key(&self, remote_table: &str) -> String {
        format!("{}{}", self.checkpoint_prefix, remote_table)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
