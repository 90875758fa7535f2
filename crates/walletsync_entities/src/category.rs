//! User categories, optionally derived from a system category.

use crate::system_category;
use crate::validate::{self, CategoryKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walletsync_engine::{EntitySync, RefResolver, SyncResult};
use walletsync_protocol::{LocalId, LocalRecord, RemoteRow};

/// Remote table name.
pub const TABLE: &str = "categories";

/// A user-defined category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name.
    pub name: String,
    /// `#rrggbb` color.
    pub color: String,
    /// Icon identifier.
    #[serde(default)]
    pub icon: Option<String>,
    /// Income or expense.
    pub kind: CategoryKind,
    /// Local id of the system category this one derives from.
    #[serde(default)]
    pub system_category_id: Option<LocalId>,
}

/// Sync descriptor for [`Category`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CategorySync;

#[async_trait]
impl EntitySync for CategorySync {
    type Entity = Category;

    fn local_table(&self) -> &'static str {
        TABLE
    }

    fn remote_table(&self) -> &'static str {
        TABLE
    }

    fn references(&self) -> &'static [&'static str] {
        &[system_category::TABLE]
    }

    async fn map_in(&self, row: &RemoteRow, refs: &RefResolver) -> SyncResult<Category> {
        let parent = validate::opt_remote_ref(row, "system_category_id");
        Ok(Category {
            name: validate::name("name", row.str("name")?)?,
            color: validate::color("color", row.str("color")?)?,
            icon: row.opt_str("icon")?.map(str::to_string),
            kind: row.str("kind")?.parse()?,
            system_category_id: refs
                .local_id_for_opt(system_category::TABLE, parent.as_ref())
                .await?,
        })
    }

    async fn map_out(&self, record: &LocalRecord<Category>, refs: &RefResolver) -> SyncResult<RemoteRow> {
        let category = &record.data;
        let parent = refs
            .remote_id_for_opt(system_category::TABLE, category.system_category_id.as_ref())
            .await?;

        let mut row = RemoteRow::new()
            .with("name", validate::name("name", &category.name)?)
            .with("color", validate::color("color", &category.color)?)
            .with("kind", category.kind.as_str());
        row.set("icon", category.icon.clone());
        validate::set_opt_ref(&mut row, "system_category_id", parent);
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{resolver, seed};
    use walletsync_engine::SyncError;
    use walletsync_protocol::RemoteId;

    fn row(parent: Option<&str>) -> RemoteRow {
        let mut row = RemoteRow::new()
            .with("name", "Rent")
            .with("color", "#00ff00")
            .with("kind", "expense");
        if let Some(parent) = parent {
            row.set("system_category_id", parent);
        }
        row
    }

    #[tokio::test]
    async fn parent_is_remapped_both_ways() {
        let (refs, store) = resolver();
        let parent = seed(&store, system_category::TABLE, Some("srv-sys-1"));

        let category = CategorySync.map_in(&row(Some("srv-sys-1")), &refs).await.unwrap();
        assert_eq!(category.system_category_id, Some(parent));

        let record = LocalRecord::new(category, chrono::Utc::now());
        let out = CategorySync.map_out(&record, &refs).await.unwrap();
        assert_eq!(out.id_in("system_category_id"), Some(RemoteId::new("srv-sys-1")));
    }

    #[tokio::test]
    async fn parent_is_optional() {
        let (refs, _) = resolver();
        let category = CategorySync.map_in(&row(None), &refs).await.unwrap();
        assert_eq!(category.system_category_id, None);

        let record = LocalRecord::new(category, chrono::Utc::now());
        let out = CategorySync.map_out(&record, &refs).await.unwrap();
        assert_eq!(out.get("system_category_id"), Some(&serde_json::Value::Null));
    }

    #[tokio::test]
    async fn unknown_parent_fails_loudly() {
        let (refs, _) = resolver();
        let err = CategorySync.map_in(&row(Some("srv-404")), &refs).await.unwrap_err();
        assert!(matches!(err, SyncError::UnresolvedReference { .. }));
    }
}
