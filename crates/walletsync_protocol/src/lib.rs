//! # WalletSync Protocol
//!
//! Shared data types for the WalletSync engine.
//!
//! This crate provides:
//! - `LocalId` / `RemoteId` identifiers
//! - `LocalRecord` envelope carrying sync metadata around entity data
//! - `RemoteRow` and `Query` for the remote table contract
//! - `TrashEntry` and `PendingDeletion` tombstones
//! - `ConflictResolution` and `ConflictPolicy`
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod error;
mod ids;
mod query;
mod record;
mod row;
mod tombstone;

pub use conflict::{Conflict, ConflictPolicy, ConflictResolution};
pub use error::{ProtocolError, ProtocolResult};
pub use ids::{LocalId, RemoteId};
pub use query::{Order, Predicate, PredicateOp, Query};
pub use record::{LocalRecord, RawRecord};
pub use row::{format_timestamp, parse_timestamp, RemoteRow};
pub use tombstone::{PendingDeletion, TrashEntry};
