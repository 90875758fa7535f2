//! Default table registry and sync order.

use crate::{
    category, currency, exchange_rate, system_category, tag, wallet, wallet_type, CategorySync,
    CurrencySync, ExchangeRateSync, SystemCategorySync, TagSync, WalletSync, WalletTypeSync,
};
use std::sync::Arc;
use walletsync_engine::{
    CollectionRegistry, EntitySync, Orchestrator, SyncContext, SyncEngine, SyncResult,
};

/// Remote tables in dependency order.
pub const SYNC_ORDER: [&str; 7] = [
    currency::TABLE,
    wallet_type::TABLE,
    system_category::TABLE,
    tag::TABLE,
    category::TABLE,
    wallet::TABLE,
    exchange_rate::TABLE,
];

/// Returns the tables referenced by `table`, or `None` if it is unknown.
pub fn dependencies(table: &str) -> Option<&'static [&'static str]> {
    let references = match table {
        currency::TABLE => CurrencySync.references(),
        wallet_type::TABLE => WalletTypeSync.references(),
        system_category::TABLE => SystemCategorySync.references(),
        tag::TABLE => TagSync.references(),
        category::TABLE => CategorySync.references(),
        wallet::TABLE => WalletSync.references(),
        exchange_rate::TABLE => ExchangeRateSync.references(),
        _ => return None,
    };
    Some(references)
}

/// Maps every remote table to the local collection of the same name.
pub fn default_registry() -> CollectionRegistry {
    let mut registry = CollectionRegistry::new();
    for table in SYNC_ORDER {
        // Names in SYNC_ORDER are distinct, so registration cannot fail.
        let _ = registry.register(table, table);
    }
    registry
}

fn engine<D: EntitySync>(descriptor: D, ctx: &SyncContext) -> SyncResult<Arc<SyncEngine<D>>> {
    Ok(Arc::new(SyncEngine::new(descriptor, ctx.clone())?))
}

/// Builds an orchestrator running every entity in [`SYNC_ORDER`].
///
/// `ctx.registry` must map every table, e.g. [`default_registry`].
pub fn default_orchestrator(ctx: &SyncContext) -> SyncResult<Orchestrator> {
    Orchestrator::new()
        .with(engine(CurrencySync, ctx)?)?
        .with(engine(WalletTypeSync, ctx)?)?
        .with(engine(SystemCategorySync, ctx)?)?
        .with(engine(TagSync, ctx)?)?
        .with(engine(CategorySync, ctx)?)?
        .with(engine(WalletSync, ctx)?)?
        .with(engine(ExchangeRateSync, ctx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletsync_engine::{MemoryBackend, MemoryStore, SystemClock};

    #[test]
    fn every_table_is_registered_in_order() {
        let registry = default_registry();
        for table in SYNC_ORDER {
            assert_eq!(registry.local_for(table).unwrap(), table);
        }

        let ctx = SyncContext::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBackend::new(Arc::new(SystemClock))),
            registry,
        );
        let orchestrator = default_orchestrator(&ctx).unwrap();
        assert_eq!(orchestrator.tables(), SYNC_ORDER);
    }

    #[test]
    fn dependencies_precede_dependents() {
        for (position, table) in SYNC_ORDER.iter().enumerate() {
            for dependency in dependencies(table).unwrap() {
                let before = SYNC_ORDER.iter().position(|t| t == dependency).unwrap();
                assert!(before < position, "{table} depends on {dependency}");
            }
        }
        assert!(dependencies("transactions").is_none());
    }

    #[test]
    fn missing_registration_is_reported() {
        let ctx = SyncContext::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBackend::new(Arc::new(SystemClock))),
            CollectionRegistry::new().with(currency::TABLE, currency::TABLE).unwrap(),
        );
        assert!(default_orchestrator(&ctx).is_err());
    }
}
