//! Remote table rows.

use crate::error::{ProtocolError, ProtocolResult};
use crate::ids::RemoteId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A row of a remote table, or an outbound payload for one.
///
/// Rows are JSON objects. Every stored row carries `id`, `created_at` and
/// `updated_at`; payloads built for insert/update carry entity columns only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRow(Map<String, Value>);

impl RemoteRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Sets a column, builder style.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Sets a column.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    /// Removes a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    /// Returns the raw value of a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Returns true if the column is present and non-null.
    pub fn has(&self, column: &str) -> bool {
        self.get(column).is_some_and(|v| !v.is_null())
    }

    /// Copies every column of `other` into this row.
    pub fn merge(&mut self, other: RemoteRow) {
        self.0.extend(other.0);
    }

    /// Iterates over columns.
    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the underlying JSON object.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Returns the server identifier from the `id` column.
    ///
    /// Numeric identifiers are accepted and rendered as strings.
    pub fn id(&self) -> Option<RemoteId> {
        self.id_in("id")
    }

    /// Returns the identifier held in `column`.
    pub fn id_in(&self, column: &str) -> Option<RemoteId> {
        match self.get(column)? {
            Value::String(s) if !s.is_empty() => Some(RemoteId::new(s.as_str())),
            Value::Number(n) => Some(RemoteId::new(n.to_string())),
            _ => None,
        }
    }

    /// Reads a required string column.
    pub fn str(&self, column: &str) -> ProtocolResult<&str> {
        self.opt_str(column)?
            .ok_or_else(|| ProtocolError::missing(column))
    }

    /// Reads an optional string column.
    pub fn opt_str(&self, column: &str) -> ProtocolResult<Option<&str>> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(ProtocolError::invalid(column, "string")),
        }
    }

    /// Reads a required integer column.
    pub fn i64(&self, column: &str) -> ProtocolResult<i64> {
        match self.get(column) {
            None | Some(Value::Null) => Err(ProtocolError::missing(column)),
            Some(v) => v
                .as_i64()
                .ok_or_else(|| ProtocolError::invalid(column, "integer")),
        }
    }

    /// Reads a required floating point column.
    ///
    /// Numeric strings are accepted, as decimal columns are often serialized
    /// that way.
    pub fn f64(&self, column: &str) -> ProtocolResult<f64> {
        match self.get(column) {
            None | Some(Value::Null) => Err(ProtocolError::missing(column)),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| ProtocolError::invalid(column, "number")),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| ProtocolError::invalid(column, "number")),
        }
    }

    /// Reads a boolean column, treating absence as `false`.
    pub fn flag(&self, column: &str) -> ProtocolResult<bool> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ProtocolError::invalid(column, "boolean")),
        }
    }

    /// Reads a required timestamp column.
    pub fn timestamp(&self, column: &str) -> ProtocolResult<DateTime<Utc>> {
        parse_timestamp(self.str(column).map_err(|err| match err {
            ProtocolError::InvalidColumn { column, .. } => {
                ProtocolError::invalid(column, "RFC 3339 timestamp")
            }
            other => other,
        })?)
    }

    /// Reads the `updated_at` column.
    pub fn updated_at(&self) -> ProtocolResult<DateTime<Utc>> {
        self.timestamp("updated_at")
    }
}

impl From<Map<String, Value>> for RemoteRow {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for RemoteRow {
    type Error = ProtocolError;

    fn try_from(value: Value) -> ProtocolResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ProtocolError::invalid("<row>", "object")),
        }
    }
}

impl From<RemoteRow> for Value {
    fn from(row: RemoteRow) -> Self {
        Value::Object(row.0)
    }
}

/// Formats a timestamp the way rows carry it on the wire.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses an RFC 3339 timestamp.
pub fn parse_timestamp(value: &str) -> ProtocolResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|source| ProtocolError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}
