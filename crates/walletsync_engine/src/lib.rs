//! # WalletSync Engine
//!
//! Offline-first sync engine for WalletSync.
//!
//! This crate provides:
//! - A generic per-entity engine running four phases in strict order
//! - A deletion ledger so local deletions survive until the remote confirms
//! - Foreign-key remapping between local and remote identifiers
//! - Per-entity checkpoints and single-flight phase guards
//! - An orchestrator enforcing dependency order across entities
//! - Adapter contracts for the local store, remote backend, connectivity,
//!   checkpoints and clock, with in-memory and REST implementations
//!
//! ## Architecture
//!
//! Each `sync()` call runs:
//! 1. Pull deletions: apply trash rows newer than the checkpoint
//! 2. Push deletions: delete ledger entries on the remote
//! 3. Pull changes: upsert remote rows newer than the checkpoint
//! 4. Push changes: insert or update dirty local records
//!
//! Deletions run before changes so a record deleted on one side is never
//! resurrected by the other side's change stream.
//!
//! ## Key Invariants
//!
//! - Every local deletion of a pushed record leaves exactly one ledger entry
//! - A ledger entry is removed only after the remote delete succeeded
//! - The checkpoint never moves backwards
//! - A failed push leaves the record dirty
//! - Re-running a completed sync writes nothing

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod checkpoint;
mod clock;
mod collection;
mod config;
mod connectivity;
mod descriptor;
mod engine;
mod error;
mod ledger;
mod memory;
mod orchestrator;
mod remap;
mod rest;
mod state;
mod store;

pub use backend::{RemoteBackend, RemoteResult};
pub use checkpoint::{CheckpointResult, CheckpointStore, JsonFileCheckpointStore, MemoryCheckpointStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{Collection, CollectionRegistry};
pub use config::SyncConfig;
pub use connectivity::{AlwaysOnline, Connectivity, ToggleConnectivity};
pub use descriptor::EntitySync;
pub use engine::{SyncContext, SyncEngine};
pub use error::{CheckpointError, RemoteError, StoreError, SyncError, SyncResult};
pub use ledger::DeletionLedger;
pub use memory::{BackendSnapshot, CallCounts, MemoryBackend, MemoryStore, RemoteOp, StoreSnapshot};
pub use orchestrator::{EntityReport, Orchestrator, SyncReport, SyncTarget};
pub use remap::RefResolver;
pub use rest::{HttpClient, HttpRequest, HttpResponse, Method, RestBackend};
pub use state::{SyncCounts, SyncPhase, SyncStats};
pub use store::{FieldFilter, LocalStore, StoreResult, WriteBatch, WriteOp};

pub use async_trait::async_trait;
pub use walletsync_protocol as protocol;

/// Version of the engine crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
