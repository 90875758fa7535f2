//! # WalletSync Entities
//!
//! The entity types synced by WalletSync and their sync descriptors.
//!
//! | entity | table | references |
//! |--------|-------|------------|
//! | [`Currency`] | `currencies` | |
//! | [`WalletType`] | `wallet_types` | |
//! | [`SystemCategory`] | `system_categories` | |
//! | [`Tag`] | `tags` | |
//! | [`Category`] | `categories` | `system_categories` (optional) |
//! | [`Wallet`] | `wallets` | `currencies`, `wallet_types` |
//! | [`ExchangeRate`] | `exchange_rates` | `currencies` (twice) |
//!
//! Locally, references hold local ids; on the wire they hold remote ids.
//! [`default_orchestrator`] registers the engines in [`SYNC_ORDER`] so
//! every referenced table syncs before the tables pointing at it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod category;
pub mod currency;
pub mod exchange_rate;
mod registry;
pub mod system_category;
pub mod tag;
mod validate;
pub mod wallet;
pub mod wallet_type;

pub use category::{Category, CategorySync};
pub use currency::{Currency, CurrencySync};
pub use exchange_rate::{ExchangeRate, ExchangeRateSync};
pub use registry::{default_orchestrator, default_registry, dependencies, SYNC_ORDER};
pub use system_category::{SystemCategory, SystemCategorySync};
pub use tag::{Tag, TagSync};
pub use validate::CategoryKind;
pub use wallet::{Wallet, WalletSync};
pub use wallet_type::{WalletType, WalletTypeSync};
