//! # WalletSync Testkit
//!
//! Test utilities for WalletSync.
//!
//! This crate provides:
//! - [`TestWorld`]: a device and a server wired to in-memory adapters
//! - JSON [`Fixture`]s describing both sides of a sync
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use walletsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn syncs() {
//!     let world = TestWorld::new();
//!     let report = world.orchestrator().unwrap().sync_all(&world.user_id).await;
//!     assert!(report.is_success());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod world;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::world::*;
}

pub use fixtures::*;
pub use generators::*;
pub use world::*;
