//! Tags.

use crate::validate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walletsync_engine::{EntitySync, RefResolver, SyncResult};
use walletsync_protocol::{LocalRecord, RemoteRow};

/// Remote table name.
pub const TABLE: &str = "tags";

/// A free-form label attached to transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Display name, trimmed and non-empty.
    pub name: String,
    /// `#rrggbb` color.
    pub color: String,
}

impl Tag {
    /// Creates a tag.
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Sync descriptor for [`Tag`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TagSync;

#[async_trait]
impl EntitySync for TagSync {
    type Entity = Tag;

    fn local_table(&self) -> &'static str {
        TABLE
    }

    fn remote_table(&self) -> &'static str {
        TABLE
    }

    async fn map_in(&self, row: &RemoteRow, _refs: &RefResolver) -> SyncResult<Tag> {
        Ok(Tag {
            name: validate::name("name", row.str("name")?)?,
            color: validate::color("color", row.str("color")?)?,
        })
    }

    async fn map_out(&self, record: &LocalRecord<Tag>, _refs: &RefResolver) -> SyncResult<RemoteRow> {
        Ok(RemoteRow::new()
            .with("name", validate::name("name", &record.data.name)?)
            .with("color", validate::color("color", &record.data.color)?))
    }
}
