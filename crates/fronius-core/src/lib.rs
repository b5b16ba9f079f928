//! Bridge logic between a Fronius inverter and a FIMP message bus.
//!
//! - **[`Bridge`]**: central facade. Owns the shared state object (settings,
//!   connectivity, inclusion, last reading), spawns the polling task and the
//!   command processor, and exposes an outbound channel of [`Outbound`]
//!   messages for the transport to publish.
//!
//! - **Polling engine** ([`Bridge::poll_once`]): fetches realtime data on a
//!   fixed period, tracks connectivity, persists a [`PersistedSnapshot`]
//!   after every tick.
//!
//! - **[`Lifecycle`]**: inclusion/exclusion state machine. No measurement
//!   is published for a device that has not been included.
//!
//! - **Command router** ([`Bridge::handle`]): dispatches inbound commands by
//!   [`CommandKind`] to control actions, configuration changes and lifecycle
//!   operations. Every command that expects a reply gets exactly one.
//!
//! - **[`StateStore`]** / **[`LogLevelControl`]**: seams to the binary's
//!   file persistence and tracing subscriber.

pub mod bridge;
pub mod bus;
pub mod command;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod publish;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, PollOutcome};
pub use bus::{BusMessage, Outbound};
pub use command::{CommandKind, ControlAction};
pub use config::{BridgeSettings, SettingsUpdate, UNCONFIGURED_HOST};
pub use error::CoreError;
pub use lifecycle::{Lifecycle, ReadingDecision};
pub use logging::LogLevelControl;
pub use model::{
    ConnectivityState, DataSource, ExclusionReport, InclusionReport, InclusionState, NormalizedReading,
    PersistedSnapshot,
};
pub use store::{MemoryStore, StateStore};
