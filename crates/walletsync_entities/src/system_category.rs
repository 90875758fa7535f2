//! Built-in categories shared by every user.

use crate::validate::{self, CategoryKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walletsync_engine::{EntitySync, RefResolver, SyncResult};
use walletsync_protocol::{LocalRecord, RemoteRow};

/// Remote table name.
pub const TABLE: &str = "system_categories";

/// A predefined category that user categories can derive from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemCategory {
    /// Display name.
    pub name: String,
    /// Icon identifier.
    #[serde(default)]
    pub icon: Option<String>,
    /// Income or expense.
    pub kind: CategoryKind,
}

/// Sync descriptor for [`SystemCategory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCategorySync;

#[async_trait]
impl EntitySync for SystemCategorySync {
    type Entity = SystemCategory;

    fn local_table(&self) -> &'static str {
        TABLE
    }

    fn remote_table(&self) -> &'static str {
        TABLE
    }

    async fn map_in(&self, row: &RemoteRow, _refs: &RefResolver) -> SyncResult<SystemCategory> {
        Ok(SystemCategory {
            name: validate::name("name", row.str("name")?)?,
            icon: row.opt_str("icon")?.map(str::to_string),
            kind: row.str("kind")?.parse()?,
        })
    }

    async fn map_out(&self, record: &LocalRecord<SystemCategory>, _refs: &RefResolver) -> SyncResult<RemoteRow> {
        let category = &record.data;
        let mut row = RemoteRow::new()
            .with("name", validate::name("name", &category.name)?)
            .with("kind", category.kind.as_str());
        row.set("icon", category.icon.clone());
        Ok(row)
    }
}
