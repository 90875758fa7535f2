//! In-memory adapters.
//!
//! [`MemoryStore`] and [`MemoryBackend`] implement the store and backend
//! contracts without I/O. They are used by tests, by the CLI's fixture
//! runner, and as a reference for real adapters. Both support failure
//! injection.

use crate::backend::{RemoteBackend, RemoteResult};
use crate::clock::Clock;
use crate::error::{RemoteError, StoreError};
use crate::store::{FieldFilter, LocalStore, StoreResult, WriteBatch, WriteOp};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use walletsync_protocol::{
    format_timestamp, LocalId, PendingDeletion, Query, RawRecord, RemoteId, RemoteRow, TrashEntry,
};

/// Serializable contents of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Records per collection.
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<RawRecord>>,
    /// Deletion ledger entries.
    #[serde(default)]
    pub pending_deletions: Vec<PendingDeletion>,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    collections: BTreeMap<String, BTreeMap<LocalId, RawRecord>>,
    deletions: Vec<PendingDeletion>,
}

impl StoreState {
    fn apply(&mut self, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::Create { collection, record } => {
                let records = self.collections.entry(collection.clone()).or_default();
                if records.contains_key(&record.id) {
                    return Err(StoreError::AlreadyExists {
                        collection,
                        id: record.id,
                    });
                }
                records.insert(record.id.clone(), record);
            }
            WriteOp::Update { collection, record } => {
                let slot = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|records| records.get_mut(&record.id));
                match slot {
                    Some(slot) => *slot = record,
                    None => {
                        return Err(StoreError::NotFound {
                            collection,
                            id: record.id,
                        })
                    }
                }
            }
            WriteOp::Destroy { collection, id } => {
                if let Some(records) = self.collections.get_mut(&collection) {
                    records.remove(&id);
                }
            }
            WriteOp::MarkSynced {
                collection,
                id,
                remote_id,
                remote_updated_at,
                seen_updated_at,
            } => {
                if let Some(record) = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|records| records.get_mut(&id))
                {
                    record.remote_id = Some(remote_id);
                    if remote_updated_at.is_some() {
                        record.remote_updated_at = remote_updated_at;
                    }
                    if record.updated_at == seen_updated_at {
                        record.dirty = false;
                    }
                }
            }
            WriteOp::ApplyRemote {
                collection,
                record,
                seen_updated_at,
                seen_dirty,
            } => {
                if let Some(slot) = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|records| records.get_mut(&record.id))
                {
                    if slot.updated_at == seen_updated_at && slot.dirty == seen_dirty {
                        *slot = record;
                    }
                }
            }
            WriteOp::EnqueueDeletion(entry) => self.deletions.push(entry),
            WriteOp::ClearDeletion(id) => self.deletions.retain(|entry| entry.id != id),
        }
        Ok(())
    }
}

/// A transactional in-memory local store.
///
/// A commit applies its batch to a copy of the state and swaps the copy in
/// only if every operation succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    commits: AtomicU64,
    writes: AtomicU64,
    fail_next: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let collections = snapshot
            .collections
            .into_iter()
            .map(|(name, records)| {
                let records = records.into_iter().map(|r| (r.id.clone(), r)).collect();
                (name, records)
            })
            .collect();
        Self {
            state: RwLock::new(StoreState {
                collections,
                deletions: snapshot.pending_deletions,
            }),
            ..Self::default()
        }
    }

    /// Captures the current contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            collections: state
                .collections
                .iter()
                .map(|(name, records)| (name.clone(), sorted(records.values().cloned().collect())))
                .collect(),
            pending_deletions: state.deletions.clone(),
        }
    }

    /// Inserts or replaces a record without a transaction.
    pub fn insert_raw<T: Serialize>(&self, collection: &str, record: walletsync_protocol::LocalRecord<T>) {
        let Ok(raw) = record.into_raw() else {
            return;
        };
        self.state
            .write()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(raw.id.clone(), raw);
    }

    /// Returns every record of a collection, oldest first.
    pub fn records(&self, collection: &str) -> Vec<RawRecord> {
        let state = self.state.read();
        state
            .collections
            .get(collection)
            .map(|records| sorted(records.values().cloned().collect()))
            .unwrap_or_default()
    }

    /// Returns every deletion ledger entry.
    pub fn deletions(&self) -> Vec<PendingDeletion> {
        self.state.read().deletions.clone()
    }

    /// Makes the next commit fail without applying anything.
    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Returns the number of successful commits.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Returns the number of operations applied by successful commits.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

fn sorted(mut records: Vec<RawRecord>) -> Vec<RawRecord> {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    records
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn query(&self, collection: &str, filters: &[FieldFilter]) -> StoreResult<Vec<RawRecord>> {
        let state = self.state.read();
        let Some(records) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let matching = records
            .values()
            .filter(|record| filters.iter().all(|f| f.matches(record)))
            .cloned()
            .collect();
        Ok(sorted(matching))
    }

    async fn get(&self, collection: &str, id: &LocalId) -> StoreResult<Option<RawRecord>> {
        let state = self.state.read();
        Ok(state
            .collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn pending_deletions(&self, table: &str) -> StoreResult<Vec<PendingDeletion>> {
        let mut entries: Vec<PendingDeletion> = self
            .state
            .read()
            .deletions
            .iter()
            .filter(|entry| entry.table_name == table)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.deleted_at.cmp(&b.deleted_at));
        Ok(entries)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }

        let mut state = self.state.write();
        let mut next = state.clone();
        let ops = batch.into_ops();
        let count = ops.len() as u64;
        for op in ops {
            next.apply(op)?;
        }
        *state = next;

        self.commits.fetch_add(1, Ordering::SeqCst);
        self.writes.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }
}

/// Remote operation kinds, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    /// `select`
    Select,
    /// `insert`
    Insert,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

/// Calls received by a [`MemoryBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Select calls.
    pub selects: u64,
    /// Insert calls.
    pub inserts: u64,
    /// Update calls.
    pub updates: u64,
    /// Delete calls.
    pub deletes: u64,
}

impl CallCounts {
    /// Returns the number of write calls.
    pub fn writes(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }
}

#[derive(Debug, Clone)]
struct Failure {
    op: RemoteOp,
    table: String,
    id: Option<RemoteId>,
}

/// Serializable contents of a [`MemoryBackend`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSnapshot {
    /// Rows per table.
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<RemoteRow>>,
}

/// An in-memory remote backend.
///
/// Assigns ids of the form `srv-<n>`, stamps `created_at` and `updated_at`
/// from its clock, and moves deleted rows' identities to the trash table
/// on behalf of the session user.
pub struct MemoryBackend {
    tables: RwLock<BTreeMap<String, Vec<RemoteRow>>>,
    clock: Arc<dyn Clock>,
    session_user: RwLock<Option<String>>,
    trash_table: String,
    next_id: AtomicU64,
    failures: Mutex<Vec<Failure>>,
    calls: Mutex<CallCounts>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            clock,
            session_user: RwLock::new(None),
            trash_table: "trash".into(),
            next_id: AtomicU64::new(1),
            failures: Mutex::new(Vec::new()),
            calls: Mutex::new(CallCounts::default()),
        }
    }

    /// Restores a backend from a snapshot.
    pub fn from_snapshot(clock: Arc<dyn Clock>, snapshot: BackendSnapshot) -> Self {
        let backend = Self::new(clock);
        *backend.tables.write() = snapshot.tables;
        backend
    }

    /// Sets the user that deletes are attributed to.
    pub fn with_session_user(self, user_id: impl Into<String>) -> Self {
        *self.session_user.write() = Some(user_id.into());
        self
    }

    /// Changes the session user.
    pub fn set_session_user(&self, user_id: Option<&str>) {
        *self.session_user.write() = user_id.map(str::to_string);
    }

    /// Sets the numeric part of the next assigned id.
    pub fn set_next_id(&self, next: u64) {
        self.next_id.store(next, Ordering::SeqCst);
    }

    /// Makes every `op` against `table` fail until cleared.
    pub fn fail(&self, op: RemoteOp, table: &str) {
        self.failures.lock().push(Failure {
            op,
            table: table.to_string(),
            id: None,
        });
    }

    /// Makes `op` against one row of `table` fail until cleared.
    pub fn fail_row(&self, op: RemoteOp, table: &str, id: &RemoteId) {
        self.failures.lock().push(Failure {
            op,
            table: table.to_string(),
            id: Some(id.clone()),
        });
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Returns call counters.
    pub fn calls(&self) -> CallCounts {
        *self.calls.lock()
    }

    /// Resets call counters.
    pub fn reset_calls(&self) {
        *self.calls.lock() = CallCounts::default();
    }

    /// Stores a row as-is, bypassing id and timestamp assignment.
    pub fn seed_row(&self, table: &str, row: RemoteRow) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Returns every row of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<RemoteRow> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Returns one row by id.
    pub fn row(&self, table: &str, id: &RemoteId) -> Option<RemoteRow> {
        self.tables
            .read()
            .get(table)
            .and_then(|rows| rows.iter().find(|row| row.id().as_ref() == Some(id)))
            .cloned()
    }

    /// Returns every trash row naming `table`.
    pub fn trash_for(&self, table: &str) -> Vec<TrashEntry> {
        self.rows(&self.trash_table)
            .iter()
            .filter_map(|row| TrashEntry::from_row(row).ok())
            .filter(|entry| entry.table_name == table)
            .collect()
    }

    /// Captures the current contents.
    pub fn snapshot(&self) -> BackendSnapshot {
        BackendSnapshot {
            tables: self.tables.read().clone(),
        }
    }

    fn record(&self, op: RemoteOp) {
        let mut calls = self.calls.lock();
        match op {
            RemoteOp::Select => calls.selects += 1,
            RemoteOp::Insert => calls.inserts += 1,
            RemoteOp::Update => calls.updates += 1,
            RemoteOp::Delete => calls.deletes += 1,
        }
    }

    fn check(&self, op: RemoteOp, table: &str, id: Option<&RemoteId>) -> RemoteResult<()> {
        self.record(op);
        let injected = self.failures.lock().iter().any(|f| {
            f.op == op && f.table == table && (f.id.is_none() || f.id.as_ref() == id)
        });
        if injected {
            return Err(RemoteError::Network(format!("injected {op:?} failure on {table}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> RemoteResult<Vec<RemoteRow>> {
        self.check(RemoteOp::Select, table, None)?;
        let tables = self.tables.read();
        Ok(tables
            .get(table)
            .map(|rows| query.apply(rows))
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, mut payload: RemoteRow) -> RemoteResult<RemoteRow> {
        self.check(RemoteOp::Insert, table, None)?;
        let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = format_timestamp(self.clock.now());
        payload.set("id", id);
        payload.set("created_at", now.clone());
        payload.set("updated_at", now);

        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(payload.clone());
        Ok(payload)
    }

    async fn update(&self, table: &str, id: &RemoteId, mut payload: RemoteRow) -> RemoteResult<RemoteRow> {
        self.check(RemoteOp::Update, table, Some(id))?;
        let now = format_timestamp(self.clock.now());
        let mut tables = self.tables.write();
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row.id().as_ref() == Some(id)))
            .ok_or_else(|| RemoteError::NotFound {
                table: table.to_string(),
                id: id.clone(),
            })?;

        payload.remove("id");
        row.merge(payload);
        row.set("updated_at", now);
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &RemoteId) -> RemoteResult<()> {
        self.check(RemoteOp::Delete, table, Some(id))?;
        let deleted_at = self.clock.now();
        let session_user = self.session_user.read().clone();
        let mut tables = self.tables.write();

        let Some(rows) = tables.get_mut(table) else {
            return Ok(());
        };
        let before = rows.len();
        rows.retain(|row| row.id().as_ref() != Some(id));
        if rows.len() == before {
            return Ok(());
        }

        if let Some(deleted_by) = session_user {
            let entry = TrashEntry {
                table_name: table.to_string(),
                record_id: id.clone(),
                deleted_by,
                deleted_at,
            };
            tables
                .entry(self.trash_table.clone())
                .or_default()
                .push(entry.to_row());
        }
        Ok(())
    }
}
