//! Field validation shared by the entity descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use walletsync_engine::{SyncError, SyncResult};
use walletsync_protocol::{ProtocolError, RemoteId, RemoteRow};

/// Trims a name and rejects empty values.
pub fn name(column: &str, value: &str) -> SyncResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SyncError::mapping(format!("{column} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Validates a `#rrggbb` color, normalizing to lowercase.
pub fn color(column: &str, value: &str) -> SyncResult<String> {
    let value = value.trim();
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(SyncError::mapping(format!(
            "{column} must be a #rrggbb color, got `{value}`"
        )));
    }
    Ok(value.to_ascii_lowercase())
}

/// Reads a required reference column holding a remote id.
pub fn remote_ref(row: &RemoteRow, column: &str) -> SyncResult<RemoteId> {
    row.id_in(column)
        .ok_or_else(|| ProtocolError::missing(column).into())
}

/// Reads a nullable reference column holding a remote id.
pub fn opt_remote_ref(row: &RemoteRow, column: &str) -> Option<RemoteId> {
    row.id_in(column)
}

/// Writes a nullable reference column.
pub fn set_opt_ref(row: &mut RemoteRow, column: &str, remote_id: Option<RemoteId>) {
    match remote_id {
        Some(id) => row.set(column, id.as_str()),
        None => row.set(column, serde_json::Value::Null),
    }
}

/// Whether a category counts money in or out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Money in.
    Income,
    /// Money out.
    Expense,
}

impl CategoryKind {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(SyncError::mapping(format!("unknown category kind `{other}`"))),
        }
    }
}
