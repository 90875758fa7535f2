//! Generic four-phase sync engine.

use crate::backend::{RemoteBackend, RemoteResult};
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use crate::clock::{Clock, SystemClock};
use crate::collection::{Collection, CollectionRegistry};
use crate::config::SyncConfig;
use crate::connectivity::{AlwaysOnline, Connectivity};
use crate::descriptor::EntitySync;
use crate::error::{RemoteError, SyncError, SyncResult};
use crate::ledger::DeletionLedger;
use crate::remap::RefResolver;
use crate::state::{InFlight, SyncCounts, SyncPhase, SyncStats};
use crate::store::{FieldFilter, LocalStore, WriteBatch, WriteOp};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use walletsync_protocol::{
    Conflict, ConflictResolution, LocalId, LocalRecord, PendingDeletion, Query, RemoteId,
    RemoteRow, TrashEntry,
};

/// Adapters and configuration shared by every entity engine.
///
/// Built once at startup and cloned into each engine.
#[derive(Clone)]
pub struct SyncContext {
    /// Local store adapter.
    pub store: Arc<dyn LocalStore>,
    /// Remote backend adapter.
    pub backend: Arc<dyn RemoteBackend>,
    /// Reachability oracle.
    pub connectivity: Arc<dyn Connectivity>,
    /// Checkpoint persistence.
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Remote table to local collection mapping.
    pub registry: Arc<CollectionRegistry>,
    /// Engine configuration.
    pub config: SyncConfig,
}

impl SyncContext {
    /// Creates a context with default connectivity, clock, checkpoints and config.
    pub fn new(
        store: Arc<dyn LocalStore>,
        backend: Arc<dyn RemoteBackend>,
        registry: CollectionRegistry,
    ) -> Self {
        Self {
            store,
            backend,
            connectivity: Arc::new(AlwaysOnline),
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            clock: Arc::new(SystemClock),
            registry: Arc::new(registry),
            config: SyncConfig::default(),
        }
    }

    /// Sets the connectivity oracle.
    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Sets the checkpoint store.
    pub fn with_checkpoints(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    /// Sets the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns a deletion ledger over the local store.
    pub fn ledger(&self) -> DeletionLedger {
        DeletionLedger::new(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            Arc::clone(&self.clock),
        )
    }

    /// Returns a reference resolver for a sync run.
    pub fn resolver(&self, user_id: &str) -> RefResolver {
        RefResolver::new(Arc::clone(&self.store), Arc::clone(&self.registry), user_id)
    }
}

/// Result of reconciling one remote row with local state.
enum Reconciled<T> {
    Unchanged,
    Created(LocalRecord<T>),
    Updated(LocalRecord<T>),
}

/// A record staged for the pull transaction.
struct Staged<T> {
    record: LocalRecord<T>,
    /// `updated_at` and dirty flag of the stored record when it was read.
    /// `None` for records created by this pull.
    seen: Option<(DateTime<Utc>, bool)>,
}

/// Synchronizes one entity type.
///
/// `sync()` runs, in strict order: pull deletions, push deletions, pull
/// changes, push changes, then advances the checkpoint. Every phase is
/// single-flight per engine: a call that finds the phase already running
/// returns zero counts instead of waiting.
pub struct SyncEngine<D: EntitySync> {
    descriptor: D,
    ctx: SyncContext,
    collection: Collection<D::Entity>,
    ledger: DeletionLedger,
    phase: RwLock<SyncPhase>,
    in_flight: InFlight,
    stats: RwLock<SyncStats>,
}

impl<D: EntitySync> SyncEngine<D> {
    /// Creates an engine for one descriptor.
    ///
    /// Fails if the descriptor's remote table is not registered, or is
    /// registered under a different local collection.
    pub fn new(descriptor: D, ctx: SyncContext) -> SyncResult<Self> {
        let registered = ctx.registry.local_for(descriptor.remote_table())?;
        if registered != descriptor.local_table() {
            return Err(SyncError::mapping(format!(
                "{} is registered to collection {registered}, descriptor uses {}",
                descriptor.remote_table(),
                descriptor.local_table()
            )));
        }

        let collection = Collection::new(Arc::clone(&ctx.store), descriptor.local_table());
        let ledger = ctx.ledger();
        Ok(Self {
            descriptor,
            ctx,
            collection,
            ledger,
            phase: RwLock::new(SyncPhase::Idle),
            in_flight: InFlight::default(),
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// Returns the descriptor.
    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    /// Returns the typed local collection.
    pub fn collection(&self) -> &Collection<D::Entity> {
        &self.collection
    }

    /// Returns the deletion ledger.
    pub fn ledger(&self) -> &DeletionLedger {
        &self.ledger
    }

    /// Gets the current phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the checkpoint key of this entity.
    pub fn checkpoint_key(&self) -> String {
        self.ctx.config.checkpoint_key(self.descriptor.remote_table())
    }

    /// Returns the stored checkpoint, or the Unix epoch if none was stored.
    pub async fn last_sync(&self) -> SyncResult<DateTime<Utc>> {
        Ok(self
            .ctx
            .checkpoints
            .get(&self.checkpoint_key())
            .await?
            .unwrap_or_default())
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write() = phase;
    }

    /// Performs a full sync cycle.
    #[instrument(skip(self), fields(table = self.descriptor.remote_table()))]
    pub async fn sync(&self, user_id: &str) -> SyncResult<SyncCounts> {
        let Some(_guard) = self.in_flight.try_enter(SyncPhase::Idle) else {
            debug!("sync already in flight, skipping");
            return Ok(SyncCounts::default());
        };

        let started_at = self.ctx.clock.now();
        let result = self.run_cycle(user_id, started_at).await;
        self.set_phase(SyncPhase::Idle);

        match result {
            Ok(counts) => {
                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.totals += counts;
                    stats.last_success = Some(started_at);
                    stats.last_error = None;
                }
                info!(
                    pulled = counts.changes_pulled,
                    pushed = counts.changes_pushed,
                    deletions_pulled = counts.deletions_pulled,
                    deletions_pushed = counts.deletions_pushed,
                    conflicts = counts.conflicts,
                    skipped = counts.skipped,
                    "sync completed"
                );
                Ok(counts)
            }
            Err(e) => {
                self.stats.write().last_error = Some(e.to_string());
                warn!(error = %e, "sync failed");
                Err(e)
            }
        }
    }

    async fn run_cycle(&self, user_id: &str, started_at: DateTime<Utc>) -> SyncResult<SyncCounts> {
        let last_sync = self.last_sync().await?;
        let mut counts = SyncCounts::default();
        let mut pulls_ran = true;

        match self
            .run_phase(SyncPhase::PullingDeletions, || {
                self.pull_deletions_inner(user_id, last_sync)
            })
            .await?
        {
            Some(phase) => counts += phase,
            None => pulls_ran = false,
        }

        if let Some(phase) = self
            .run_phase(SyncPhase::PushingDeletions, || self.push_deletions_inner())
            .await?
        {
            counts += phase;
        }

        match self
            .run_phase(SyncPhase::PullingChanges, || {
                self.pull_changes_inner(user_id, last_sync)
            })
            .await?
        {
            Some(phase) => counts += phase,
            None => pulls_ran = false,
        }

        if let Some(phase) = self
            .run_phase(SyncPhase::PushingChanges, || self.push_changes_inner(user_id))
            .await?
        {
            counts += phase;
        }

        if pulls_ran {
            self.advance_checkpoint(started_at).await?;
        } else {
            debug!("a pull phase was skipped, checkpoint unchanged");
        }
        Ok(counts)
    }

    /// Runs a phase under its single-flight guard.
    ///
    /// Returns `Ok(None)` when the phase was skipped, either because it is
    /// already running or because the network is unreachable.
    async fn run_phase<F, Fut>(&self, phase: SyncPhase, run: F) -> SyncResult<Option<SyncCounts>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<SyncCounts>>,
    {
        let Some(_guard) = self.in_flight.try_enter(phase) else {
            debug!(phase = phase.as_str(), "phase already in flight, skipping");
            return Ok(None);
        };
        self.run_claimed(phase, run).await
    }

    /// Runs a phase whose guard the caller holds.
    async fn run_claimed<F, Fut>(&self, phase: SyncPhase, run: F) -> SyncResult<Option<SyncCounts>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<SyncCounts>>,
    {
        if !self.ctx.connectivity.is_online() {
            debug!(phase = phase.as_str(), "offline, skipping phase");
            return Ok(None);
        }

        self.set_phase(phase);
        let counts = run().await?;
        debug!(
            phase = phase.as_str(),
            writes = counts.total_writes(),
            skipped = counts.skipped,
            "phase finished"
        );
        Ok(Some(counts))
    }

    async fn run_standalone<F, Fut>(&self, phase: SyncPhase, run: F) -> SyncResult<SyncCounts>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<SyncCounts>>,
    {
        // The running holder owns the phase state; leave it alone.
        let Some(_guard) = self.in_flight.try_enter(phase) else {
            debug!(phase = phase.as_str(), "phase already in flight, skipping");
            return Ok(SyncCounts::default());
        };
        let result = self.run_claimed(phase, run).await;
        self.set_phase(SyncPhase::Idle);
        Ok(result?.unwrap_or_default())
    }

    /// Removes local records whose remote rows were moved to the trash
    /// table after `last_sync`.
    pub async fn pull_deletions(&self, user_id: &str, last_sync: DateTime<Utc>) -> SyncResult<SyncCounts> {
        self.run_standalone(SyncPhase::PullingDeletions, || {
            self.pull_deletions_inner(user_id, last_sync)
        })
        .await
    }

    /// Pushes pending ledger entries as remote deletes.
    pub async fn push_deletions(&self) -> SyncResult<SyncCounts> {
        self.run_standalone(SyncPhase::PushingDeletions, || self.push_deletions_inner())
            .await
    }

    /// Pulls remote rows modified after `last_sync`.
    pub async fn pull_changes(&self, user_id: &str, last_sync: DateTime<Utc>) -> SyncResult<SyncCounts> {
        self.run_standalone(SyncPhase::PullingChanges, || {
            self.pull_changes_inner(user_id, last_sync)
        })
        .await
    }

    /// Pushes dirty local records.
    pub async fn push_changes(&self, user_id: &str) -> SyncResult<SyncCounts> {
        self.run_standalone(SyncPhase::PushingChanges, || self.push_changes_inner(user_id))
            .await
    }

    async fn pull_deletions_inner(&self, user_id: &str, last_sync: DateTime<Utc>) -> SyncResult<SyncCounts> {
        let table = self.descriptor.remote_table();
        let collection = self.collection.name();
        let query = Query::new()
            .eq("deleted_by", user_id)
            .eq("table_name", table)
            .after("deleted_at", last_sync)
            .order_by("deleted_at", true);
        let rows = self
            .ctx
            .backend
            .select(&self.ctx.config.trash_table, &query)
            .await?;

        let mut counts = SyncCounts::default();
        let mut batch = WriteBatch::new();
        let mut removed: HashSet<LocalId> = HashSet::new();

        for row in rows {
            let entry = match TrashEntry::from_row(&row) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(table, error = %e, "skipping undecodable trash row");
                    counts.skipped += 1;
                    continue;
                }
            };

            let matches = self
                .ctx
                .store
                .query(collection, &[FieldFilter::RemoteId(entry.record_id.clone())])
                .await?;
            if matches.is_empty() {
                debug!(table, remote_id = %entry.record_id, "deleted record not present locally");
            }
            for record in matches {
                if removed.insert(record.id.clone()) {
                    batch.destroy(collection, record.id);
                    counts.deletions_pulled += 1;
                }
            }
        }

        if !batch.is_empty() {
            self.ctx.store.commit(batch).await?;
        }
        Ok(counts)
    }

    async fn push_deletions_inner(&self) -> SyncResult<SyncCounts> {
        let table = self.descriptor.remote_table();
        let pending = self.ledger.pending(table).await?;

        let mut counts = SyncCounts::default();
        let mut confirmed = Vec::with_capacity(pending.len());
        for entry in pending {
            match self.ctx.backend.delete(table, &entry.remote_id).await {
                Ok(()) => confirmed.push(entry),
                Err(e) => {
                    warn!(table, remote_id = %entry.remote_id, error = %e, "remote delete failed, keeping tombstone");
                    counts.skipped += 1;
                }
            }
        }

        counts.deletions_pushed = confirmed.len() as u64;
        self.ledger.confirm(&confirmed).await?;
        Ok(counts)
    }

    async fn pull_changes_inner(&self, user_id: &str, last_sync: DateTime<Utc>) -> SyncResult<SyncCounts> {
        let table = self.descriptor.remote_table();
        let updated_at_column = self.ctx.config.updated_at_column.as_str();
        let query = Query::new()
            .after(updated_at_column, last_sync)
            .order_by(updated_at_column, true);
        let rows = self.ctx.backend.select(table, &query).await?;

        let refs = self.ctx.resolver(user_id);
        let pending: HashSet<RemoteId> = self
            .ledger
            .pending(table)
            .await?
            .into_iter()
            .map(|entry| entry.remote_id)
            .collect();

        let mut counts = SyncCounts::default();
        let mut conflicts = Vec::new();
        let mut staged: Vec<Staged<D::Entity>> = Vec::new();
        let mut staged_index: HashMap<RemoteId, usize> = HashMap::new();

        for row in rows {
            let Some(remote_id) = row.id_in(&self.ctx.config.id_column) else {
                warn!(table, "skipping remote row without id");
                counts.skipped += 1;
                continue;
            };
            if pending.contains(&remote_id) {
                debug!(table, remote_id = %remote_id, "row is pending local deletion, skipping");
                continue;
            }
            let remote_updated_at = match row.timestamp(updated_at_column) {
                Ok(at) => at,
                Err(e) => {
                    warn!(table, remote_id = %remote_id, error = %e, "skipping remote row");
                    counts.skipped += 1;
                    continue;
                }
            };

            let staged_at = staged_index.get(&remote_id).copied();
            let existing = match staged_at {
                Some(index) => Some(staged[index].record.clone()),
                None => match self.collection.find_by_remote_id(&remote_id).await {
                    Ok(found) => found,
                    Err(SyncError::Serialization(e)) => {
                        warn!(table, remote_id = %remote_id, error = %e, "local record is undecodable, skipping");
                        counts.skipped += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };

            let seen = match staged_at {
                Some(index) => staged[index].seen,
                None => existing.as_ref().map(|r| (r.updated_at, r.dirty)),
            };
            let reconciled = self
                .reconcile(existing, &row, &remote_id, remote_updated_at, &refs, &mut conflicts)
                .await;
            let record = match reconciled {
                Ok(Reconciled::Unchanged) => continue,
                Ok(Reconciled::Created(record) | Reconciled::Updated(record)) => record,
                Err(e) => {
                    warn!(table, remote_id = %remote_id, error = %e, "skipping remote row");
                    counts.skipped += 1;
                    continue;
                }
            };

            match staged_at {
                Some(index) => staged[index].record = record,
                None => {
                    staged_index.insert(remote_id, staged.len());
                    staged.push(Staged { record, seen });
                }
            }
        }

        counts.changes_pulled = staged.len() as u64;
        counts.conflicts = conflicts.len() as u64;

        let collection = self.collection.name();
        let mut batch = WriteBatch::new();
        for Staged { record, seen } in staged {
            let raw = record.into_raw()?;
            match seen {
                None => batch.create(collection, raw),
                // A local edit committed meanwhile wins; it is pushed next.
                Some((updated_at, dirty)) => batch.apply_remote(collection, raw, updated_at, dirty),
            };
        }
        if !batch.is_empty() {
            self.ctx.store.commit(batch).await?;
        }

        self.stats.write().last_conflicts = conflicts;
        Ok(counts)
    }

    async fn reconcile(
        &self,
        existing: Option<LocalRecord<D::Entity>>,
        row: &RemoteRow,
        remote_id: &RemoteId,
        remote_updated_at: DateTime<Utc>,
        refs: &RefResolver,
        conflicts: &mut Vec<Conflict>,
    ) -> SyncResult<Reconciled<D::Entity>> {
        let Some(mut local) = existing else {
            let data = self.descriptor.map_in(row, refs).await?;
            return Ok(Reconciled::Created(LocalRecord {
                id: LocalId::generate(),
                remote_id: Some(remote_id.clone()),
                dirty: false,
                created_at: row.timestamp("created_at").unwrap_or(remote_updated_at),
                updated_at: remote_updated_at,
                remote_updated_at: Some(remote_updated_at),
                data,
            }));
        };

        // Not newer than what this record was last reconciled with, e.g. the
        // echo of our own push.
        if local
            .remote_updated_at
            .is_some_and(|seen| remote_updated_at <= seen)
        {
            return Ok(Reconciled::Unchanged);
        }

        if !local.dirty {
            let data = self.descriptor.map_in(row, refs).await?;
            if data == local.data {
                return Ok(Reconciled::Unchanged);
            }
            local.data = data;
            local.updated_at = remote_updated_at;
            local.remote_updated_at = Some(remote_updated_at);
            return Ok(Reconciled::Updated(local));
        }

        let resolution = self
            .descriptor
            .resolve_conflict(&local, row)
            .unwrap_or_else(|| {
                self.ctx
                    .config
                    .conflict_policy
                    .resolve(local.updated_at, remote_updated_at)
            });
        conflicts.push(Conflict {
            table: self.descriptor.remote_table().to_string(),
            local_id: local.id.clone(),
            remote_id: remote_id.clone(),
            local_updated_at: local.updated_at,
            remote_updated_at,
            resolution,
        });
        debug!(
            table = self.descriptor.remote_table(),
            local_id = %local.id,
            resolution = resolution.as_str(),
            "conflict detected"
        );

        match resolution {
            ConflictResolution::KeepLocal => Ok(Reconciled::Unchanged),
            ConflictResolution::AcceptRemote => {
                local.data = self.descriptor.map_in(row, refs).await?;
                local.dirty = false;
                local.updated_at = remote_updated_at;
                local.remote_updated_at = Some(remote_updated_at);
                Ok(Reconciled::Updated(local))
            }
            ConflictResolution::Merge => {
                local.data = self.descriptor.merge(&local, row, refs).await?;
                local.dirty = true;
                local.updated_at = self.ctx.clock.now();
                local.remote_updated_at = Some(remote_updated_at);
                Ok(Reconciled::Updated(local))
            }
        }
    }

    async fn push_changes_inner(&self, user_id: &str) -> SyncResult<SyncCounts> {
        let table = self.descriptor.remote_table();
        let collection = self.collection.name();
        let dirty = self
            .ctx
            .store
            .query(collection, &[FieldFilter::Dirty(true)])
            .await?;
        let refs = self.ctx.resolver(user_id);

        let mut counts = SyncCounts::default();
        let mut batch = WriteBatch::new();

        for raw in dirty {
            let local_id = raw.id.clone();
            let record: LocalRecord<D::Entity> = match raw.decode() {
                Ok(record) => record,
                Err(e) => {
                    warn!(table, local_id = %local_id, error = %e, "local record is undecodable, skipping");
                    counts.skipped += 1;
                    continue;
                }
            };
            let payload = match self.descriptor.map_out(&record, &refs).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(table, local_id = %record.id, error = %e, "cannot map record for push, skipping");
                    counts.skipped += 1;
                    continue;
                }
            };

            let pushed = match &record.remote_id {
                Some(remote_id) => self
                    .ctx
                    .backend
                    .update(table, remote_id, payload)
                    .await
                    .map(|row| (remote_id.clone(), row)),
                None => self.insert(table, payload, user_id).await,
            };

            let (remote_id, row) = match pushed {
                Ok(pushed) => pushed,
                Err(e) => {
                    warn!(table, local_id = %record.id, error = %e, "push failed, record stays dirty");
                    counts.skipped += 1;
                    continue;
                }
            };

            if record.is_new() && self.ctx.store.get(collection, &record.id).await?.is_none() {
                // Deleted locally while the insert was in flight.
                batch.enqueue_deletion(PendingDeletion::new(table, remote_id, self.ctx.clock.now()));
            } else {
                batch.push(WriteOp::MarkSynced {
                    collection: collection.to_string(),
                    id: record.id.clone(),
                    remote_id,
                    remote_updated_at: row.timestamp(&self.ctx.config.updated_at_column).ok(),
                    seen_updated_at: record.updated_at,
                });
            }
            counts.changes_pushed += 1;
        }

        if !batch.is_empty() {
            self.ctx.store.commit(batch).await?;
        }
        Ok(counts)
    }

    async fn insert(&self, table: &str, mut payload: RemoteRow, user_id: &str) -> RemoteResult<(RemoteId, RemoteRow)> {
        if let Some(owner) = &self.ctx.config.owner_column {
            if !payload.has(owner) {
                payload.set(owner.as_str(), user_id);
            }
        }
        let row = self.ctx.backend.insert(table, payload).await?;
        let remote_id = row
            .id_in(&self.ctx.config.id_column)
            .ok_or_else(|| RemoteError::Decode(format!("insert into {table} returned no id")))?;
        Ok((remote_id, row))
    }

    async fn advance_checkpoint(&self, started_at: DateTime<Utc>) -> SyncResult<()> {
        let key = self.checkpoint_key();
        let previous = self.ctx.checkpoints.get(&key).await?;
        let next = previous.map_or(started_at, |previous| previous.max(started_at));
        if previous != Some(next) {
            self.ctx.checkpoints.set(&key, next).await?;
        }
        Ok(())
    }
}
