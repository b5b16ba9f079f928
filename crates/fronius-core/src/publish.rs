// ── Measurement publisher and report builders ──
//
// Maps normalized readings and lifecycle events into bus messages.
// Readings are carried in watts and watt-hours; the only unit change
// happens here: energy goes out in kWh.

use std::collections::BTreeMap;

use crate::bus::{BusMessage, Outbound, SERVICE_NAME};
use crate::model::report::METER_SERVICE;
use crate::model::{
    AppManifest, ConfigActionReport, ConfigReport, ExclusionReport, ExtendedReport, InclusionReport,
    NormalizedReading, StateReport,
};

/// `val` of an `evt.meter_ext.report`.
pub fn measurement_values(reading: &NormalizedReading) -> BTreeMap<String, f64> {
    let mut values = BTreeMap::new();
    values.insert("p_export".to_owned(), reading.power_w);
    values.insert("last_e_export".to_owned(), reading.energy_today_wh / 1000.0);
    if let Some(freq) = reading.frequency_hz {
        values.insert("freq".to_owned(), freq);
    }
    if let Some(u1) = reading.voltage_ac_v {
        values.insert("u1".to_owned(), u1);
    }
    if let Some(i1) = reading.current_ac_a {
        values.insert("i1".to_owned(), i1);
    }
    values
}

/// Measurement report on the meter topic.
pub fn measurement_report(reading: &NormalizedReading) -> Outbound {
    let val = serde_json::to_value(measurement_values(reading)).unwrap_or_default();
    Outbound::meter(BusMessage::new(
        "evt.meter_ext.report",
        METER_SERVICE,
        "float_map",
        val,
    ))
}

pub fn inclusion_message(report: &InclusionReport) -> BusMessage {
    BusMessage::object("evt.thing.inclusion_report", SERVICE_NAME, report)
}

pub fn exclusion_message(report: &ExclusionReport) -> BusMessage {
    BusMessage::object("evt.thing.exclusion_report", SERVICE_NAME, report)
}

pub fn config_action_message(report: &ConfigActionReport) -> BusMessage {
    BusMessage::object("evt.app.config_action_report", SERVICE_NAME, report)
}

pub fn config_message(report: &ConfigReport) -> BusMessage {
    BusMessage::object("evt.app.config_report", SERVICE_NAME, report)
}

pub fn extended_report_message(report: &ExtendedReport) -> BusMessage {
    BusMessage::object("evt.config.extended_report", SERVICE_NAME, report)
}

pub fn state_message(report: &StateReport) -> BusMessage {
    BusMessage::object("evt.app.state_report", SERVICE_NAME, report)
}

pub fn manifest_message(manifest: &AppManifest) -> BusMessage {
    BusMessage::object("evt.app.manifest_report", SERVICE_NAME, manifest)
}

/// `evt.log.level_report`: `val` is the level now in effect.
pub fn log_level_message(level: &str, ok: bool) -> BusMessage {
    BusMessage::new(
        "evt.log.level_report",
        SERVICE_NAME,
        "string",
        serde_json::Value::String(level.to_owned()),
    )
    .with_prop("op_status", if ok { "ok" } else { "error" })
}
