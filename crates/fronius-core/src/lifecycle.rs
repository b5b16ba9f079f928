// ── Inclusion lifecycle ──
//
// Decides when the inverter is announced to the bus and gates the
// measurement publisher: readings computed while `NotIncluded` never
// leave the bridge.

use tracing::info;

use crate::config::BridgeSettings;
use crate::model::{ExclusionReport, InclusionReport, InclusionState, NormalizedReading};

/// What to do with a fresh reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingDecision {
    pub should_publish: bool,
    /// Present when this reading is the one that included the device.
    pub inclusion: Option<InclusionReport>,
}

/// Owns [`InclusionState`].
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    inclusion: InclusionState,
}

impl Lifecycle {
    /// Resume from a persisted inclusion state.
    pub fn new(inclusion: InclusionState) -> Self {
        Self { inclusion }
    }

    pub fn inclusion(&self) -> InclusionState {
        self.inclusion
    }

    pub fn is_included(&self) -> bool {
        self.inclusion == InclusionState::Included
    }

    /// First reading after (re)configuration includes the device; every
    /// reading from then on is publishable.
    pub fn on_reading(&mut self, reading: &NormalizedReading) -> ReadingDecision {
        let inclusion = if self.is_included() {
            None
        } else {
            info!(device_id = %reading.device_id, "first reading, including device");
            Some(self.include())
        };

        ReadingDecision {
            should_publish: true,
            inclusion,
        }
    }

    /// Explicit inclusion request from the hub.
    pub fn include(&mut self) -> InclusionReport {
        self.inclusion = InclusionState::Included;
        InclusionReport::descriptor()
    }

    /// Remove the device: back to `NotIncluded` and the host reference
    /// reset to the sentinel. Idempotent.
    pub fn on_delete(&mut self, settings: &mut BridgeSettings, address: &str) -> ExclusionReport {
        if self.is_included() {
            info!(address, "excluding device");
        }
        self.inclusion = InclusionState::NotIncluded;
        settings.reset_host();
        ExclusionReport {
            address: address.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::UNCONFIGURED_HOST;

    fn reading() -> NormalizedReading {
        NormalizedReading {
            power_w: 10.0,
            energy_today_wh: 0.0,
            energy_year_wh: 0.0,
            energy_total_wh: 0.0,
            frequency_hz: None,
            voltage_ac_v: None,
            current_ac_a: None,
            voltage_dc_v: None,
            current_dc_a: None,
            device_id: "1".into(),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn first_reading_includes_once() {
        let mut lifecycle = Lifecycle::default();

        let first = lifecycle.on_reading(&reading());
        assert!(first.should_publish);
        assert!(first.inclusion.is_some());
        assert_eq!(lifecycle.inclusion(), InclusionState::Included);

        let second = lifecycle.on_reading(&reading());
        assert!(second.should_publish);
        assert!(second.inclusion.is_none());
    }

    #[test]
    fn restored_inclusion_does_not_reannounce() {
        let mut lifecycle = Lifecycle::new(InclusionState::Included);
        assert!(lifecycle.on_reading(&reading()).inclusion.is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let mut lifecycle = Lifecycle::new(InclusionState::Included);
        let mut settings = BridgeSettings {
            host: "192.168.1.20".into(),
            ..BridgeSettings::default()
        };

        let first = lifecycle.on_delete(&mut settings, "1");
        let second = lifecycle.on_delete(&mut settings, "1");

        assert_eq!(first, ExclusionReport { address: "1".into() });
        assert_eq!(second, first);
        assert_eq!(lifecycle.inclusion(), InclusionState::NotIncluded);
        assert_eq!(settings.host, UNCONFIGURED_HOST);
    }

    #[test]
    fn deleted_device_is_included_again_by_next_reading() {
        let mut lifecycle = Lifecycle::new(InclusionState::Included);
        lifecycle.on_delete(&mut BridgeSettings::default(), "1");
        assert!(lifecycle.on_reading(&reading()).inclusion.is_some());
    }
}
