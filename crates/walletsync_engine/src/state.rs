//! Engine phase state, single-flight guards and counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use walletsync_protocol::Conflict;

/// The phase an entity engine is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Not syncing.
    Idle,
    /// Pulling remote deletions from the trash table.
    PullingDeletions,
    /// Pushing local deletions from the ledger.
    PushingDeletions,
    /// Pulling remote changes.
    PullingChanges,
    /// Pushing dirty local records.
    PushingChanges,
}

impl SyncPhase {
    /// The four phases, in execution order.
    pub const ORDER: [SyncPhase; 4] = [
        SyncPhase::PullingDeletions,
        SyncPhase::PushingDeletions,
        SyncPhase::PullingChanges,
        SyncPhase::PushingChanges,
    ];

    /// Returns true if the engine is in an active sync phase.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncPhase::Idle)
    }

    /// Returns true if this phase reads from the remote.
    pub fn is_pull(&self) -> bool {
        matches!(self, SyncPhase::PullingDeletions | SyncPhase::PullingChanges)
    }

    /// Returns the phase's short name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::PullingDeletions => "pull_deletions",
            SyncPhase::PushingDeletions => "push_deletions",
            SyncPhase::PullingChanges => "pull_changes",
            SyncPhase::PushingChanges => "push_changes",
        }
    }

    fn slot(&self) -> usize {
        match self {
            SyncPhase::Idle => 0,
            SyncPhase::PullingDeletions => 1,
            SyncPhase::PushingDeletions => 2,
            SyncPhase::PullingChanges => 3,
            SyncPhase::PushingChanges => 4,
        }
    }
}

/// Counts produced by one sync call or phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    /// Local records removed because of remote deletions.
    pub deletions_pulled: u64,
    /// Ledger entries confirmed on the remote.
    pub deletions_pushed: u64,
    /// Local records created or overwritten from remote rows.
    pub changes_pulled: u64,
    /// Dirty records inserted or updated on the remote.
    pub changes_pushed: u64,
    /// Conflicts detected between dirty records and remote updates.
    pub conflicts: u64,
    /// Records skipped because of a per-record failure.
    pub skipped: u64,
}

impl SyncCounts {
    /// Returns the number of local or remote writes performed.
    pub fn total_writes(&self) -> u64 {
        self.deletions_pulled + self.deletions_pushed + self.changes_pulled + self.changes_pushed
    }

    /// Returns true if nothing happened.
    pub fn is_empty(&self) -> bool {
        *self == SyncCounts::default()
    }
}

impl AddAssign for SyncCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.deletions_pulled += rhs.deletions_pulled;
        self.deletions_pushed += rhs.deletions_pushed;
        self.changes_pulled += rhs.changes_pulled;
        self.changes_pushed += rhs.changes_pushed;
        self.conflicts += rhs.conflicts;
        self.skipped += rhs.skipped;
    }
}

/// Statistics about an engine's sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Number of `sync()` calls that completed successfully.
    pub cycles_completed: u64,
    /// Cumulative counts over completed cycles.
    pub totals: SyncCounts,
    /// Time of the last successful cycle.
    pub last_success: Option<DateTime<Utc>>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Conflicts detected by the last pull.
    pub last_conflicts: Vec<Conflict>,
}

/// Single-flight flags: one for the whole sync, one per phase.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    slots: [AtomicBool; 5],
}

impl InFlight {
    /// Claims the slot for `phase` (`Idle` stands for the whole sync).
    ///
    /// Returns `None` if another call holds it.
    pub(crate) fn try_enter(&self, phase: SyncPhase) -> Option<FlightGuard<'_>> {
        let flag = &self.slots[phase.slot()];
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flag })
    }
}

/// Releases a single-flight slot on drop.
#[derive(Debug)]
pub(crate) struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_checks() {
        assert!(!SyncPhase::Idle.is_active());
        assert!(SyncPhase::PullingChanges.is_active());
        assert!(SyncPhase::PullingDeletions.is_pull());
        assert!(!SyncPhase::PushingChanges.is_pull());
        assert_eq!(SyncPhase::ORDER[0], SyncPhase::PullingDeletions);
        assert_eq!(SyncPhase::ORDER[3], SyncPhase::PushingChanges);
    }

    #[test]
    fn counts_accumulate() {
        let mut total = SyncCounts::default();
        assert!(total.is_empty());
        total += SyncCounts {
            changes_pushed: 2,
            conflicts: 1,
            ..SyncCounts::default()
        };
        total += SyncCounts {
            deletions_pulled: 1,
            skipped: 3,
            ..SyncCounts::default()
        };
        assert_eq!(total.total_writes(), 3);
        assert_eq!(total.skipped, 3);
        assert!(!total.is_empty());
    }

    #[test]
    fn guards_are_exclusive_per_slot() {
        let in_flight = InFlight::default();
        let guard = in_flight.try_enter(SyncPhase::PullingChanges).unwrap();
        assert!(in_flight.try_enter(SyncPhase::PullingChanges).is_none());
        assert!(in_flight.try_enter(SyncPhase::PushingChanges).is_some());
        drop(guard);
        assert!(in_flight.try_enter(SyncPhase::PullingChanges).is_some());
    }
}
