//! Wallet types (cash, bank account, mobile money...).

use crate::validate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walletsync_engine::{EntitySync, RefResolver, SyncResult};
use walletsync_protocol::{LocalRecord, RemoteRow};

/// Remote table name.
pub const TABLE: &str = "wallet_types";

/// A kind of wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletType {
    /// Display name.
    pub name: String,
    /// Icon identifier.
    #[serde(default)]
    pub icon: Option<String>,
}

/// Sync descriptor for [`WalletType`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletTypeSync;

#[async_trait]
impl EntitySync for WalletTypeSync {
    type Entity = WalletType;

    fn local_table(&self) -> &'static str {
        TABLE
    }

    fn remote_table(&self) -> &'static str {
        TABLE
    }

    async fn map_in(&self, row: &RemoteRow, _refs: &RefResolver) -> SyncResult<WalletType> {
        Ok(WalletType {
            name: validate::name("name", row.str("name")?)?,
            icon: row.opt_str("icon")?.map(str::to_string),
        })
    }

    async fn map_out(&self, record: &LocalRecord<WalletType>, _refs: &RefResolver) -> SyncResult<RemoteRow> {
        let mut row = RemoteRow::new().with("name", validate::name("name", &record.data.name)?);
        row.set("icon", record.data.icon.clone());
        Ok(row)
    }
}
