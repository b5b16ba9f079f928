// ── Inbound command vocabulary ──
//
// Every command identifier the bridge understands, parsed once from the
// message `type`. Anything else fails to parse and is ignored by the
// router.

mod action;

pub use action::{ControlAction, ControlStep};

use strum::{Display, EnumString};

/// Commands routed by the bridge, keyed by their bus identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum CommandKind {
    // ── Inverter control ─────────────────────────────────────────────
    #[strum(serialize = "cmd.system.forced_battery_storage_prestart")]
    ForcedBatteryStoragePrestart,
    #[strum(serialize = "cmd.system.forced_battery_storage")]
    ForcedBatteryStorage,
    #[strum(serialize = "cmd.system.forced_battery_storage_finished")]
    ForcedBatteryStorageFinished,
    #[strum(serialize = "cmd.system.excess_solar_production_enabled")]
    ExcessSolarProductionEnabled,
    #[strum(serialize = "cmd.system.excess_solar_production_disabled")]
    ExcessSolarProductionDisabled,

    // ── Lifecycle ────────────────────────────────────────────────────
    #[strum(serialize = "cmd.thing.inclusion")]
    Inclusion,
    #[strum(serialize = "cmd.thing.get_inclusion_report")]
    GetInclusionReport,
    #[strum(serialize = "cmd.thing.delete")]
    Delete,
    #[strum(serialize = "cmd.app.uninstall")]
    Uninstall,

    // ── Configuration ────────────────────────────────────────────────
    #[strum(serialize = "cmd.config.extended_set")]
    ExtendedSet,
    #[strum(serialize = "cmd.config.get_extended_report")]
    GetExtendedReport,
    #[strum(serialize = "cmd.log.set_level")]
    SetLogLevel,

    // ── Queries ──────────────────────────────────────────────────────
    #[strum(serialize = "cmd.app.get_manifest")]
    GetManifest,
    #[strum(serialize = "cmd.app.get_state")]
    GetState,
    #[strum(serialize = "cmd.meter_ext.get_report")]
    GetMeterReport,
}

impl CommandKind {
    /// Parse a message type; `None` for anything unrecognized.
    pub fn parse(msg_type: &str) -> Option<Self> {
        msg_type.parse().ok()
    }

    /// The control action behind a `cmd.system.*` command.
    pub fn control_action(self) -> Option<ControlAction> {
        match self {
            Self::ForcedBatteryStoragePrestart => Some(ControlAction::ForcedBatteryStoragePrestart),
            Self::ForcedBatteryStorage => Some(ControlAction::ForcedBatteryStorage),
            Self::ForcedBatteryStorageFinished => Some(ControlAction::ForcedBatteryStorageFinished),
            Self::ExcessSolarProductionEnabled => Some(ControlAction::ExcessSolarProductionEnabled),
            Self::ExcessSolarProductionDisabled => {
                Some(ControlAction::ExcessSolarProductionDisabled)
            }
            _ => None,
        }
    }
}
