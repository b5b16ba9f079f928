// ── Bridge domain model ──
//
// Lifecycle state shared by the polling and command tasks, the snapshot
// persisted between runs, and the payloads of the reports the bridge
// publishes on the bus.

pub mod report;
pub mod state;

// ── Re-exports ──────────────────────────────────────────────────────

pub use fronius_api::{DataSource, NormalizedReading};

pub use report::{
    AppManifest, ConfigActionReport, ConfigField, ConfigReport, ExclusionReport, ExtendedReport, InclusionReport,
    Interface, Service, StateReport,
};
pub use state::{ConnectivityState, InclusionState, PersistedSnapshot};
