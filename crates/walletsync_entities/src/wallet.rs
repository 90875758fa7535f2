//! Wallets.

use crate::{currency, validate, wallet_type};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walletsync_engine::{EntitySync, RefResolver, SyncResult};
use walletsync_protocol::{LocalId, LocalRecord, RemoteRow};

/// Remote table name.
pub const TABLE: &str = "wallets";

/// A place money is held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Display name.
    pub name: String,
    /// Balance in minor units of the currency.
    pub balance: i64,
    /// Hidden from the active wallet list.
    #[serde(default)]
    pub archived: bool,
    /// Local id of the wallet's currency.
    pub currency_id: LocalId,
    /// Local id of the wallet's type.
    pub wallet_type_id: LocalId,
}

/// Sync descriptor for [`Wallet`].
///
/// Supports [`Merge`](walletsync_protocol::ConflictResolution::Merge): the
/// balance is taken from the remote row, every other field from the local
/// record.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletSync;

#[async_trait]
impl EntitySync for WalletSync {
    type Entity = Wallet;

    fn local_table(&self) -> &'static str {
        TABLE
    }

    fn remote_table(&self) -> &'static str {
        TABLE
    }

    fn references(&self) -> &'static [&'static str] {
        &[currency::TABLE, wallet_type::TABLE]
    }

    async fn map_in(&self, row: &RemoteRow, refs: &RefResolver) -> SyncResult<Wallet> {
        let currency = validate::remote_ref(row, "currency_id")?;
        let wallet_type = validate::remote_ref(row, "wallet_type_id")?;
        Ok(Wallet {
            name: validate::name("name", row.str("name")?)?,
            balance: row.i64("balance")?,
            archived: row.flag("archived")?,
            currency_id: refs.local_id_for(currency::TABLE, &currency).await?,
            wallet_type_id: refs.local_id_for(wallet_type::TABLE, &wallet_type).await?,
        })
    }

    async fn map_out(&self, record: &LocalRecord<Wallet>, refs: &RefResolver) -> SyncResult<RemoteRow> {
        let wallet = &record.data;
        let currency = refs.remote_id_for(currency::TABLE, &wallet.currency_id).await?;
        let wallet_type = refs
            .remote_id_for(wallet_type::TABLE, &wallet.wallet_type_id)
            .await?;
        Ok(RemoteRow::new()
            .with("name", validate::name("name", &wallet.name)?)
            .with("balance", wallet.balance)
            .with("archived", wallet.archived)
            .with("currency_id", currency.as_str())
            .with("wallet_type_id", wallet_type.as_str()))
    }

    async fn merge(
        &self,
        local: &LocalRecord<Wallet>,
        remote: &RemoteRow,
        _refs: &RefResolver,
    ) -> SyncResult<Wallet> {
        Ok(Wallet {
            balance: remote.i64("balance")?,
            ..local.data.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{resolver, seed};
    use walletsync_engine::SyncError;
    use walletsync_protocol::RemoteId;

    fn row() -> RemoteRow {
        RemoteRow::new()
            .with("name", "M-Pesa")
            .with("balance", 125_000)
            .with("currency_id", "srv-c1")
            .with("wallet_type_id", "srv-t1")
    }

    #[tokio::test]
    async fn references_are_remapped() {
        let (refs, store) = resolver();
        let currency = seed(&store, currency::TABLE, Some("srv-c1"));
        let wallet_type = seed(&store, wallet_type::TABLE, Some("srv-t1"));

        let wallet = WalletSync.map_in(&row(), &refs).await.unwrap();
        assert_eq!(wallet.currency_id, currency);
        assert_eq!(wallet.wallet_type_id, wallet_type);
        assert!(!wallet.archived);

        let record = LocalRecord::new(wallet, chrono::Utc::now());
        let out = WalletSync.map_out(&record, &refs).await.unwrap();
        assert_eq!(out.id_in("currency_id"), Some(RemoteId::new("srv-c1")));
        assert_eq!(out.i64("balance").unwrap(), 125_000);
    }

    #[tokio::test]
    async fn unsynced_currency_blocks_push() {
        let (refs, store) = resolver();
        let currency = seed(&store, currency::TABLE, None);
        let wallet_type = seed(&store, wallet_type::TABLE, Some("srv-t1"));
        let record = LocalRecord::new(
            Wallet {
                name: "Cash".into(),
                balance: 0,
                archived: false,
                currency_id: currency,
                wallet_type_id: wallet_type,
            },
            chrono::Utc::now(),
        );

        let err = WalletSync.map_out(&record, &refs).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingRemoteId { .. }));
        assert!(err.is_ordering_violation());
    }

    #[tokio::test]
    async fn merge_takes_remote_balance() {
        let (refs, _) = resolver();
        let local = LocalRecord::new(
            Wallet {
                name: "Renamed".into(),
                balance: 10,
                archived: true,
                currency_id: LocalId::new("c"),
                wallet_type_id: LocalId::new("t"),
            },
            chrono::Utc::now(),
        );
        let merged = WalletSync.merge(&local, &row(), &refs).await.unwrap();
        assert_eq!(merged.balance, 125_000);
        assert_eq!(merged.name, "Renamed");
        assert!(merged.archived);
    }
}
