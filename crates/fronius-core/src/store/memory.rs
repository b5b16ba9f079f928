// In-memory store for embedding and tests.

use std::sync::{Mutex, PoisonError};

use crate::config::BridgeSettings;
use crate::error::CoreError;
use crate::model::PersistedSnapshot;
use crate::store::StateStore;

/// Keeps the latest write of each kind in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<SnapshotSlot>,
    settings: Mutex<Option<BridgeSettings>>,
}

#[derive(Debug, Default)]
struct SnapshotSlot {
    last: Option<PersistedSnapshot>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot written.
    pub fn last_snapshot(&self) -> Option<PersistedSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
            .clone()
    }

    /// Number of snapshot writes so far.
    pub fn snapshot_count(&self) -> usize {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writes
    }

    /// Most recent settings written.
    pub fn last_settings(&self) -> Option<BridgeSettings> {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateStore for MemoryStore {
    fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> Result<(), CoreError> {
        let mut slot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.last = Some(snapshot.clone());
        slot.writes += 1;
        Ok(())
    }

    fn save_settings(&self, settings: &BridgeSettings) -> Result<(), CoreError> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }
}
