//! JSON fixtures describing a local and a remote world.
//!
//! A fixture captures everything a sync run reads: local collections and
//! the deletion ledger, remote tables including `trash`, and checkpoints.
//! The CLI replays fixtures; tests use them as golden inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use thiserror::Error;
use walletsync_engine::{BackendSnapshot, StoreSnapshot};

/// Errors raised while reading or writing fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// I/O failure.
    #[error("fixture I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed fixture JSON.
    #[error("invalid fixture: {0}")]
    Json(#[from] serde_json::Error),
}

/// A serialized sync world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    /// User the sync runs for.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Start time of the world clock.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
    /// Local collections and pending deletions.
    #[serde(default)]
    pub local: StoreSnapshot,
    /// Remote tables.
    #[serde(default)]
    pub remote: BackendSnapshot,
    /// Checkpoints by key.
    #[serde(default)]
    pub checkpoints: BTreeMap<String, DateTime<Utc>>,
}

impl Fixture {
    /// Parses a fixture from JSON.
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encodes the fixture as pretty JSON.
    pub fn to_json(&self) -> Result<String, FixtureError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a fixture file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Writes a fixture file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FixtureError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// A fixture written to a temporary directory, removed on drop.
pub struct TempFixture {
    dir: TempDir,
}

impl TempFixture {
    /// Writes `fixture` to `fixture.json` in a new temporary directory.
    pub fn write(fixture: &Fixture) -> Result<Self, FixtureError> {
        let dir = TempDir::new()?;
        fixture.save(dir.path().join("fixture.json"))?;
        Ok(Self { dir })
    }

    /// Path of the fixture file.
    pub fn path(&self) -> std::path::PathBuf {
        self.dir.path().join("fixture.json")
    }

    /// The temporary directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_an_empty_fixture() {
        assert_eq!(Fixture::from_json("{}").unwrap(), Fixture::default());
    }

    #[test]
    fn parses_remote_rows_and_checkpoints() {
        let fixture = Fixture::from_json(
            r##"{
                "user_id": "u1",
                "remote": {"tables": {"tags": [
                    {"id": "srv-1", "name": "Food", "color": "#ff0000",
                     "updated_at": "2024-01-01T00:00:00Z"}
                ]}},
                "checkpoints": {"last_sync_tags": "2023-12-31T00:00:00Z"}
            }"##,
        )
        .unwrap();
        assert_eq!(fixture.user_id.as_deref(), Some("u1"));
        assert_eq!(fixture.remote.tables["tags"].len(), 1);
        assert!(fixture.checkpoints.contains_key("last_sync_tags"));
    }

    #[test]
    fn files_survive_a_save_load_cycle() {
        let fixture = Fixture {
            user_id: Some("u1".into()),
            ..Fixture::default()
        };
        let temp = TempFixture::write(&fixture).unwrap();
        assert!(temp.dir().exists());
        assert_eq!(Fixture::load(temp.path()).unwrap(), fixture);
    }
}
