// ── Lifecycle state ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::NormalizedReading;

/// Whether the inverter answered the last poll. Gates polling: nothing is
/// fetched while `Disconnected`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectivityState {
    Disconnected,
    #[default]
    Connected,
}

/// Whether the inverter has been announced on the bus.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InclusionState {
    #[default]
    NotIncluded,
    Included,
}

/// State written after every poll tick and loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    #[serde(default)]
    pub last_reading: Option<NormalizedReading>,
    #[serde(default)]
    pub connectivity: ConnectivityState,
    #[serde(default)]
    pub inclusion: InclusionState,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn states_use_snake_case_everywhere() {
        assert_eq!(InclusionState::NotIncluded.to_string(), "not_included");
        assert_eq!(
            serde_json::to_string(&ConnectivityState::Disconnected).unwrap(),
            "\"disconnected\""
        );
        assert_eq!("included".parse::<InclusionState>().ok(), Some(InclusionState::Included));
    }

    #[test]
    fn empty_snapshot_document_loads_defaults() {
        let snapshot: PersistedSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot.connectivity, ConnectivityState::Connected);
        assert_eq!(snapshot.inclusion, InclusionState::NotIncluded);
        assert!(snapshot.last_reading.is_none());
    }
}
