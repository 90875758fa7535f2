//! An in-memory device and server for end-to-end sync tests.

use crate::fixtures::Fixture;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use walletsync_engine::{
    Clock, Collection, EntitySync, ManualClock, MemoryBackend, MemoryCheckpointStore,
    MemoryStore, Orchestrator, SyncContext, SyncEngine, SyncResult, ToggleConnectivity,
};
use walletsync_entities::{default_orchestrator, default_registry};

/// User id used when none is given.
pub const DEFAULT_USER: &str = "user-1";

/// One device (local store, checkpoints, connectivity) and one server,
/// sharing a manual clock.
pub struct TestWorld {
    /// Shared clock.
    pub clock: Arc<ManualClock>,
    /// Device store.
    pub store: Arc<MemoryStore>,
    /// Server.
    pub backend: Arc<MemoryBackend>,
    /// Device connectivity.
    pub connectivity: Arc<ToggleConnectivity>,
    /// Device checkpoints.
    pub checkpoints: Arc<MemoryCheckpointStore>,
    /// User the device is signed in as.
    pub user_id: String,
}

impl TestWorld {
    /// Creates an empty world for [`DEFAULT_USER`].
    pub fn new() -> Self {
        Self::for_user(DEFAULT_USER)
    }

    /// Creates an empty world for `user_id`.
    pub fn for_user(user_id: &str) -> Self {
        let clock = Arc::new(ManualClock::starting_2024());
        Self {
            backend: Arc::new(MemoryBackend::new(clock.clone()).with_session_user(user_id)),
            clock,
            store: Arc::new(MemoryStore::new()),
            connectivity: Arc::new(ToggleConnectivity::default()),
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            user_id: user_id.to_string(),
        }
    }

    /// Rebuilds a world from a fixture.
    ///
    /// `user` overrides the fixture's user. The clock starts at the
    /// fixture's `now`, or at `fallback_now` when the fixture has none.
    pub fn from_fixture(fixture: Fixture, user: Option<&str>, fallback_now: DateTime<Utc>) -> Self {
        let user_id = user
            .map(str::to_string)
            .or(fixture.user_id)
            .unwrap_or_else(|| DEFAULT_USER.to_string());
        let clock = Arc::new(ManualClock::new(fixture.now.unwrap_or(fallback_now)));
        Self {
            backend: Arc::new(
                MemoryBackend::from_snapshot(clock.clone(), fixture.remote)
                    .with_session_user(user_id.as_str()),
            ),
            clock,
            store: Arc::new(MemoryStore::from_snapshot(fixture.local)),
            connectivity: Arc::new(ToggleConnectivity::default()),
            checkpoints: Arc::new(MemoryCheckpointStore::with_values(fixture.checkpoints)),
            user_id,
        }
    }

    /// Captures the world as a fixture.
    pub fn to_fixture(&self) -> Fixture {
        Fixture {
            user_id: Some(self.user_id.clone()),
            now: Some(self.clock.peek()),
            local: self.store.snapshot(),
            remote: self.backend.snapshot(),
            checkpoints: self.checkpoints.snapshot(),
        }
    }

    /// Returns the engine context of the device.
    pub fn context(&self) -> SyncContext {
        SyncContext::new(self.store.clone(), self.backend.clone(), default_registry())
            .with_connectivity(self.connectivity.clone())
            .with_checkpoints(self.checkpoints.clone())
            .with_clock(self.clock.clone())
    }

    /// Builds the default orchestrator.
    pub fn orchestrator(&self) -> SyncResult<Orchestrator> {
        default_orchestrator(&self.context())
    }

    /// Builds a single-entity engine.
    pub fn engine<D: EntitySync>(&self, descriptor: D) -> SyncResult<SyncEngine<D>> {
        SyncEngine::new(descriptor, self.context())
    }

    /// Returns a typed handle over a local collection.
    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        Collection::new(self.store.clone(), name)
    }

    /// Returns the current time and advances the clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Switches the device offline or back online.
    pub fn set_online(&self, online: bool) {
        self.connectivity.set_online(online);
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
