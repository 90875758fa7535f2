//! Cross-entity sync ordering.
//!
//! Entities that hold foreign keys must sync after the entities they
//! reference, so references can be remapped in both directions. The
//! orchestrator enforces that order at registration time and runs engines
//! sequentially.

use crate::descriptor::EntitySync;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::state::{SyncCounts, SyncPhase, SyncStats};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// An object-safe view of one entity engine.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Remote table name.
    fn table(&self) -> &'static str;

    /// Remote tables this entity references.
    fn references(&self) -> &'static [&'static str];

    /// Current phase.
    fn phase(&self) -> SyncPhase;

    /// Current stats.
    fn stats(&self) -> SyncStats;

    /// Runs a full sync cycle.
    async fn sync(&self, user_id: &str) -> SyncResult<SyncCounts>;
}

#[async_trait]
impl<D: EntitySync> SyncTarget for SyncEngine<D> {
    fn table(&self) -> &'static str {
        self.descriptor().remote_table()
    }

    fn references(&self) -> &'static [&'static str] {
        self.descriptor().references()
    }

    fn phase(&self) -> SyncPhase {
        SyncEngine::phase(self)
    }

    fn stats(&self) -> SyncStats {
        SyncEngine::stats(self)
    }

    async fn sync(&self, user_id: &str) -> SyncResult<SyncCounts> {
        SyncEngine::sync(self, user_id).await
    }
}

/// Outcome of one entity within [`Orchestrator::sync_all`].
#[derive(Debug)]
pub struct EntityReport {
    /// Remote table name.
    pub table: &'static str,
    /// Counts, or the error that stopped this entity.
    pub outcome: SyncResult<SyncCounts>,
    /// Wall time spent.
    pub duration: Duration,
}

impl EntityReport {
    /// Returns true if the entity synced successfully.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Outcome of a sync over every registered entity.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Per-entity outcomes, in sync order.
    pub entities: Vec<EntityReport>,
}

impl SyncReport {
    /// Returns entities that synced successfully.
    pub fn succeeded(&self) -> impl Iterator<Item = &EntityReport> {
        self.entities.iter().filter(|e| e.is_success())
    }

    /// Returns entities that failed.
    pub fn failed(&self) -> impl Iterator<Item = &EntityReport> {
        self.entities.iter().filter(|e| !e.is_success())
    }

    /// Returns true if every entity synced.
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Sums the counts of successful entities.
    pub fn totals(&self) -> SyncCounts {
        let mut totals = SyncCounts::default();
        for counts in self.entities.iter().filter_map(|e| e.outcome.as_ref().ok()) {
            totals += *counts;
        }
        totals
    }

    /// Returns the report of one table.
    pub fn get(&self, table: &str) -> Option<&EntityReport> {
        self.entities.iter().find(|e| e.table == table)
    }
}

/// Runs entity engines in dependency order.
#[derive(Default)]
pub struct Orchestrator {
    targets: Vec<Arc<dyn SyncTarget>>,
}

impl Orchestrator {
    /// Creates an empty orchestrator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an engine.
    ///
    /// Every table the engine references must already be registered.
    pub fn register(&mut self, target: Arc<dyn SyncTarget>) -> SyncResult<()> {
        let table = target.table();
        if self.contains(table) {
            return Err(SyncError::DuplicateTable(table.to_string()));
        }
        if let Some(dependency) = target
            .references()
            .iter()
            .find(|dependency| **dependency != table && !self.contains(dependency))
        {
            return Err(SyncError::OutOfOrder {
                table: table.to_string(),
                dependency: dependency.to_string(),
            });
        }
        self.targets.push(target);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, target: Arc<dyn SyncTarget>) -> SyncResult<Self> {
        self.register(target)?;
        Ok(self)
    }

    /// Returns true if a table is registered.
    pub fn contains(&self, table: &str) -> bool {
        self.targets.iter().any(|t| t.table() == table)
    }

    /// Returns table names in sync order.
    pub fn tables(&self) -> Vec<&'static str> {
        self.targets.iter().map(|t| t.table()).collect()
    }

    /// Returns the engine of one table.
    pub fn get(&self, table: &str) -> Option<&Arc<dyn SyncTarget>> {
        self.targets.iter().find(|t| t.table() == table)
    }

    /// Syncs every entity in order.
    ///
    /// A failing entity is reported and does not stop later entities; an
    /// entity depending on it will typically fail with an unresolved
    /// reference until it recovers.
    #[instrument(skip(self))]
    pub async fn sync_all(&self, user_id: &str) -> SyncReport {
        let mut report = SyncReport::default();
        for target in &self.targets {
            let started = Instant::now();
            let outcome = target.sync(user_id).await;
            if let Err(e) = &outcome {
                warn!(table = target.table(), error = %e, "entity sync failed");
            }
            report.entities.push(EntityReport {
                table: target.table(),
                outcome,
                duration: started.elapsed(),
            });
        }

        let totals = report.totals();
        info!(
            entities = report.entities.len(),
            failed = report.failed().count(),
            writes = totals.total_writes(),
            "sync_all completed"
        );
        report
    }

    /// Syncs one entity.
    pub async fn sync_table(&self, table: &str, user_id: &str) -> SyncResult<SyncCounts> {
        let target = self
            .get(table)
            .ok_or_else(|| SyncError::UnknownTable(table.to_string()))?;
        target.sync(user_id).await
    }
}
