//! Exchange rates between two currencies.

use crate::{currency, validate};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use walletsync_engine::{EntitySync, RefResolver, SyncError, SyncResult};
use walletsync_protocol::{LocalId, LocalRecord, ProtocolError, RemoteRow};

/// Remote table name.
pub const TABLE: &str = "exchange_rates";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The price of one unit of `base` in `quote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Local id of the base currency.
    pub base_currency_id: LocalId,
    /// Local id of the quote currency.
    pub quote_currency_id: LocalId,
    /// Positive, finite rate.
    pub rate: f64,
    /// Day the rate applies to.
    pub as_of: NaiveDate,
}

fn rate(value: f64) -> SyncResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SyncError::mapping(format!("rate must be positive, got {value}")))
    }
}

fn distinct(base: &LocalId, quote: &LocalId) -> SyncResult<()> {
    if base == quote {
        return Err(SyncError::mapping("base and quote currency must differ"));
    }
    Ok(())
}

/// Sync descriptor for [`ExchangeRate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeRateSync;

#[async_trait]
impl EntitySync for ExchangeRateSync {
    type Entity = ExchangeRate;

    fn local_table(&self) -> &'static str {
        TABLE
    }

    fn remote_table(&self) -> &'static str {
        TABLE
    }

    fn references(&self) -> &'static [&'static str] {
        &[currency::TABLE]
    }

    async fn map_in(&self, row: &RemoteRow, refs: &RefResolver) -> SyncResult<ExchangeRate> {
        let base = validate::remote_ref(row, "base_currency_id")?;
        let quote = validate::remote_ref(row, "quote_currency_id")?;
        let as_of = NaiveDate::parse_from_str(row.str("as_of")?, DATE_FORMAT)
            .map_err(|_| ProtocolError::invalid("as_of", "YYYY-MM-DD date"))?;

        let exchange = ExchangeRate {
            base_currency_id: refs.local_id_for(currency::TABLE, &base).await?,
            quote_currency_id: refs.local_id_for(currency::TABLE, &quote).await?,
            rate: rate(row.f64("rate")?)?,
            as_of,
        };
        distinct(&exchange.base_currency_id, &exchange.quote_currency_id)?;
        Ok(exchange)
    }

    async fn map_out(&self, record: &LocalRecord<ExchangeRate>, refs: &RefResolver) -> SyncResult<RemoteRow> {
        let data = &record.data;
        distinct(&data.base_currency_id, &data.quote_currency_id)?;
        let base = refs.remote_id_for(currency::TABLE, &data.base_currency_id).await?;
        let quote = refs.remote_id_for(currency::TABLE, &data.quote_currency_id).await?;
        Ok(RemoteRow::new()
            .with("base_currency_id", base.as_str())
            .with("quote_currency_id", quote.as_str())
            .with("rate", rate(data.rate)?)
            .with("as_of", data.as_of.format(DATE_FORMAT).to_string()))
    }
}
