//! Currencies.

use crate::validate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walletsync_engine::{EntitySync, RefResolver, SyncError, SyncResult};
use walletsync_protocol::{LocalRecord, RemoteRow};

/// Remote table name.
pub const TABLE: &str = "currencies";

/// A currency wallets are denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 style code, uppercase.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Display symbol.
    pub symbol: String,
    /// Number of minor-unit digits.
    pub decimals: u8,
}

/// Highest supported number of minor-unit digits.
pub const MAX_DECIMALS: u8 = 8;

fn code(value: &str) -> SyncResult<String> {
    let code = value.trim().to_ascii_uppercase();
    if code.len() < 2 || code.len() > 8 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SyncError::mapping(format!("invalid currency code `{value}`")));
    }
    Ok(code)
}

fn decimals(value: i64) -> SyncResult<u8> {
    u8::try_from(value)
        .ok()
        .filter(|d| *d <= MAX_DECIMALS)
        .ok_or_else(|| SyncError::mapping(format!("decimals out of range: {value}")))
}

/// Sync descriptor for [`Currency`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrencySync;

#[async_trait]
impl EntitySync for CurrencySync {
    type Entity = Currency;

    fn local_table(&self) -> &'static str {
        TABLE
    }

    fn remote_table(&self) -> &'static str {
        TABLE
    }

    async fn map_in(&self, row: &RemoteRow, _refs: &RefResolver) -> SyncResult<Currency> {
        Ok(Currency {
            code: code(row.str("code")?)?,
            name: validate::name("name", row.str("name")?)?,
            symbol: row.opt_str("symbol")?.unwrap_or_default().trim().to_string(),
            decimals: decimals(row.i64("decimals")?)?,
        })
    }

    async fn map_out(&self, record: &LocalRecord<Currency>, _refs: &RefResolver) -> SyncResult<RemoteRow> {
        let currency = &record.data;
        Ok(RemoteRow::new()
            .with("code", code(&currency.code)?)
            .with("name", validate::name("name", &currency.name)?)
            .with("symbol", currency.symbol.as_str())
            .with("decimals", decimals(i64::from(currency.decimals))?))
    }
}
