// ── Persistence seam ──
//
// Core decides *when* state is written; implementors decide *how*.
// `fronius-config` provides the file-backed store used by the binary.

mod memory;

pub use memory::MemoryStore;

use crate::config::BridgeSettings;
use crate::error::CoreError;
use crate::model::PersistedSnapshot;

/// Durable storage for the bridge's snapshot and settings.
///
/// Both writes must be atomic: a crash mid-write may lose the update but
/// must never leave a file the next startup cannot load.
pub trait StateStore: Send + Sync {
    /// Called by the polling engine after every tick.
    fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> Result<(), CoreError>;

    /// Called by the command router after a settings change.
    fn save_settings(&self, settings: &BridgeSettings) -> Result<(), CoreError>;
}
