// Solar API wire types
//
// Response shapes for `GetInverterRealtimeData.cgi`. Firmware variants
// disagree on how a quantity is wrapped: system scope returns
// `{"Unit": "W", "Values": {"1": 1500}}` keyed by inverter, device scope
// (and older firmware) returns `{"Unit": "W", "Value": 1500}`. The two
// forms are resolved once into `RawVendorPayload` and normalized into a
// single `NormalizedReading`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Envelope ────────────────────────────────────────────────────────

/// `{ Head: {...}, Body: { Data: {...} } }` wrapper around every Solar API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Envelope {
    pub head: Head,
    #[serde(default)]
    pub body: Body,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Head {
    #[serde(default)]
    pub request_arguments: RequestArguments,
    pub status: Status,
    pub timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RequestArguments {
    /// String on most firmware, a bare number on some.
    pub device_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Status {
    pub code: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub user_message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Body {
    #[serde(default)]
    pub data: serde_json::Value,
}

// ── Quantity forms ──────────────────────────────────────────────────

/// One measured quantity in either vendor form.
pub trait Quantity {
    fn unit(&self) -> &str;
    /// Sum across all inverters (power and energy counters).
    fn total(&self) -> f64;
    /// A single representative value (voltages, currents, frequency).
    fn single(&self) -> Option<f64>;
}

/// `{"Unit": "W", "Values": {"1": 1500, "2": null}}`
#[derive(Debug, Deserialize)]
pub struct NestedQuantity {
    #[serde(rename = "Unit")]
    unit: String,
    #[serde(rename = "Values")]
    values: BTreeMap<String, Option<f64>>,
}

impl Quantity for NestedQuantity {
    fn unit(&self) -> &str {
        &self.unit
    }

    fn total(&self) -> f64 {
        self.values.values().flatten().sum()
    }

    fn single(&self) -> Option<f64> {
        self.values.values().flatten().copied().next()
    }
}

/// `{"Unit": "W", "Value": 1500}`
#[derive(Debug, Deserialize)]
pub struct FlatQuantity {
    #[serde(rename = "Unit")]
    unit: String,
    #[serde(rename = "Value")]
    value: Option<f64>,
}

impl Quantity for FlatQuantity {
    fn unit(&self) -> &str {
        &self.unit
    }

    fn total(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    fn single(&self) -> Option<f64> {
        self.value
    }
}

/// The `Body.Data` object, generic over the quantity form.
#[derive(Debug, Deserialize)]
pub struct DataSet<Q> {
    #[serde(rename = "PAC")]
    power: Q,
    #[serde(rename = "DAY_ENERGY")]
    energy_day: Q,
    #[serde(rename = "YEAR_ENERGY")]
    energy_year: Q,
    #[serde(rename = "TOTAL_ENERGY")]
    energy_total: Q,
    #[serde(rename = "FAC")]
    frequency: Option<Q>,
    #[serde(rename = "UAC")]
    voltage_ac: Option<Q>,
    #[serde(rename = "IAC")]
    current_ac: Option<Q>,
    #[serde(rename = "UDC")]
    voltage_dc: Option<Q>,
    #[serde(rename = "IDC")]
    current_dc: Option<Q>,
}

/// Realtime data in whichever shape the firmware sent.
///
/// Selected by the presence of `Values` (nested) or `Value` (flat) on the
/// quantities; a payload matching neither fails to deserialize.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawVendorPayload {
    Nested(DataSet<NestedQuantity>),
    Flat(DataSet<FlatQuantity>),
}

impl RawVendorPayload {
    /// Resolve units and collapse the shape into a [`NormalizedReading`].
    pub fn normalize(
        self,
        device_id: String,
        captured_at: DateTime<Utc>,
    ) -> Result<NormalizedReading, Error> {
        match self {
            Self::Nested(data) => data.normalize(device_id, captured_at),
            Self::Flat(data) => data.normalize(device_id, captured_at),
        }
    }
}

impl<Q: Quantity> DataSet<Q> {
    fn normalize(
        self,
        device_id: String,
        captured_at: DateTime<Utc>,
    ) -> Result<NormalizedReading, Error> {
        Ok(NormalizedReading {
            power_w: self.power.total() * power_scale(self.power.unit())?,
            energy_today_wh: self.energy_day.total() * energy_scale(self.energy_day.unit())?,
            energy_year_wh: self.energy_year.total() * energy_scale(self.energy_year.unit())?,
            energy_total_wh: self.energy_total.total()
                * energy_scale(self.energy_total.unit())?,
            frequency_hz: self.frequency.as_ref().and_then(Quantity::single),
            voltage_ac_v: self.voltage_ac.as_ref().and_then(Quantity::single),
            current_ac_a: self.current_ac.as_ref().and_then(Quantity::single),
            voltage_dc_v: self.voltage_dc.as_ref().and_then(Quantity::single),
            current_dc_a: self.current_dc.as_ref().and_then(Quantity::single),
            device_id,
            captured_at,
        })
    }
}

// Unit strings are case-sensitive: "mW" is milliwatts, not megawatts.
fn power_scale(unit: &str) -> Result<f64, Error> {
    match unit {
        "W" => Ok(1.0),
        "kW" => Ok(1_000.0),
        "MW" => Ok(1_000_000.0),
        other => Err(unknown_unit(other)),
    }
}

fn energy_scale(unit: &str) -> Result<f64, Error> {
    match unit {
        "Wh" => Ok(1.0),
        "kWh" => Ok(1_000.0),
        "MWh" => Ok(1_000_000.0),
        other => Err(unknown_unit(other)),
    }
}

fn unknown_unit(unit: &str) -> Error {
    Error::Decode {
        message: format!("unsupported unit '{unit}'"),
        body: String::new(),
    }
}

// ── Normalized reading ──────────────────────────────────────────────

/// One polling cycle's telemetry in canonical units.
///
/// Power is always watts and energy always watt-hours, whatever scale the
/// firmware reported. Electrical quantities are absent in system scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReading {
    pub power_w: f64,
    pub energy_today_wh: f64,
    pub energy_year_wh: f64,
    pub energy_total_wh: f64,
    pub frequency_hz: Option<f64>,
    pub voltage_ac_v: Option<f64>,
    pub current_ac_a: Option<f64>,
    pub voltage_dc_v: Option<f64>,
    pub current_dc_a: Option<f64>,
    pub device_id: String,
    pub captured_at: DateTime<Utc>,
}

// ── Decoding ────────────────────────────────────────────────────────

/// Decode a raw `GetInverterRealtimeData` response body.
///
/// Checks the status envelope first: a non-zero `Head.Status.Code` is a
/// [`Error::VendorRejected`] regardless of what `Body` holds.
pub fn decode_realtime(body: &str) -> Result<NormalizedReading, Error> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| decode_error(&e, body))?;

    let status = &envelope.head.status;
    if status.code != 0 {
        let reason = if status.reason.is_empty() {
            status.user_message.clone()
        } else {
            status.reason.clone()
        };
        return Err(Error::VendorRejected {
            code: status.code,
            reason,
        });
    }

    let payload: RawVendorPayload =
        serde_json::from_value(envelope.body.data).map_err(|e| decode_error(&e, body))?;

    let device_id = match envelope.head.request_arguments.device_id {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => "1".to_owned(),
    };
    let captured_at = envelope
        .head
        .timestamp
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map_or_else(Utc::now, |ts| ts.with_timezone(&Utc));

    payload.normalize(device_id, captured_at)
}

pub(crate) fn decode_error(err: &serde_json::Error, body: &str) -> Error {
    let preview: String = body.chars().take(200).collect();
    Error::Decode {
        message: format!("{err} (body preview: {preview:?})"),
        body: body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(data: &serde_json::Value) -> String {
        json!({
            "Head": {
                "RequestArguments": { "DeviceClass": "Inverter", "Scope": "System" },
                "Status": { "Code": 0, "Reason": "", "UserMessage": "" },
                "Timestamp": "2024-06-01T12:00:00+02:00"
            },
            "Body": { "Data": data }
        })
        .to_string()
    }

    #[test]
    fn nested_and_flat_forms_normalize_identically() {
        let nested = envelope(&json!({
            "PAC": { "Unit": "W", "Values": { "1": 1500 } },
            "DAY_ENERGY": { "Unit": "Wh", "Values": { "1": 12000 } },
            "YEAR_ENERGY": { "Unit": "Wh", "Values": { "1": 3_400_000 } },
            "TOTAL_ENERGY": { "Unit": "Wh", "Values": { "1": 9_800_000 } }
        }));
        let flat = envelope(&json!({
            "PAC": { "Unit": "kW", "Value": 1.5 },
            "DAY_ENERGY": { "Unit": "kWh", "Value": 12 },
            "YEAR_ENERGY": { "Unit": "MWh", "Value": 3.4 },
            "TOTAL_ENERGY": { "Unit": "kWh", "Value": 9800 }
        }));

        let a = decode_realtime(&nested).expect("nested decodes");
        let b = decode_realtime(&flat).expect("flat decodes");

        assert!((a.power_w - 1500.0).abs() < 1e-9);
        assert!((b.power_w - 1500.0).abs() < 1e-9);
        assert!((a.energy_today_wh - b.energy_today_wh).abs() < 1e-9);
        assert!((a.energy_year_wh - b.energy_year_wh).abs() < 1e-6);
        assert!((a.energy_total_wh - b.energy_total_wh).abs() < 1e-6);
    }

    #[test]
    fn nested_form_sums_inverters_and_skips_nulls() {
        let body = envelope(&json!({
            "PAC": { "Unit": "W", "Values": { "1": 1000, "2": 500, "3": null } },
            "DAY_ENERGY": { "Unit": "Wh", "Values": { "1": 100, "2": 50 } },
            "YEAR_ENERGY": { "Unit": "Wh", "Values": { "1": 0 } },
            "TOTAL_ENERGY": { "Unit": "Wh", "Values": { "1": 0 } },
            "UAC": { "Unit": "V", "Values": { "1": 231.5, "2": 229.0 } }
        }));

        let reading = decode_realtime(&body).expect("decodes");

        assert!((reading.power_w - 1500.0).abs() < 1e-9);
        assert!((reading.energy_today_wh - 150.0).abs() < 1e-9);
        assert_eq!(reading.voltage_ac_v, Some(231.5));
        assert_eq!(reading.frequency_hz, None);
    }

    #[test]
    fn status_code_wins_over_body() {
        let body = json!({
            "Head": {
                "Status": { "Code": 8, "Reason": "Transfer timeout", "UserMessage": "" }
            },
            "Body": { "Data": {} }
        })
        .to_string();

        match decode_realtime(&body) {
            Err(Error::VendorRejected { code, reason }) => {
                assert_eq!(code, 8);
                assert_eq!(reason, "Transfer timeout");
            }
            other => panic!("expected VendorRejected, got {other:?}"),
        }
    }

    #[test]
    fn unknown_shape_is_decode_error() {
        let body = envelope(&json!({ "PAC": { "Unit": "W", "Reading": 5 } }));
        assert!(matches!(decode_realtime(&body), Err(Error::Decode { .. })));
    }

    #[test]
    fn unknown_unit_is_decode_error() {
        let body = envelope(&json!({
            "PAC": { "Unit": "hp", "Value": 2 },
            "DAY_ENERGY": { "Unit": "Wh", "Value": 1 },
            "YEAR_ENERGY": { "Unit": "Wh", "Value": 1 },
            "TOTAL_ENERGY": { "Unit": "Wh", "Value": 1 }
        }));
        assert!(matches!(decode_realtime(&body), Err(Error::Decode { .. })));
    }

    #[test]
    fn unit_case_is_significant() {
        let body = envelope(&json!({
            "PAC": { "Unit": "mW", "Value": 1500 },
            "DAY_ENERGY": { "Unit": "Wh", "Value": 1 },
            "YEAR_ENERGY": { "Unit": "Wh", "Value": 1 },
            "TOTAL_ENERGY": { "Unit": "Wh", "Value": 1 }
        }));
        assert!(matches!(decode_realtime(&body), Err(Error::Decode { .. })));

        let body = envelope(&json!({
            "PAC": { "Unit": "MW", "Value": 0.002 },
            "DAY_ENERGY": { "Unit": "MWh", "Value": 0.5 },
            "YEAR_ENERGY": { "Unit": "Wh", "Value": 1 },
            "TOTAL_ENERGY": { "Unit": "Wh", "Value": 1 }
        }));
        let reading = decode_realtime(&body).expect("decodes");
        assert!((reading.power_w - 2000.0).abs() < 1e-6);
        assert!((reading.energy_today_wh - 500_000.0).abs() < 1e-6);
    }

    #[test]
    fn device_id_and_timestamp_come_from_head() {
        let body = json!({
            "Head": {
                "RequestArguments": { "DeviceId": 7, "Scope": "Device" },
                "Status": { "Code": 0 },
                "Timestamp": "2024-06-01T10:00:00Z"
            },
            "Body": { "Data": {
                "PAC": { "Unit": "W", "Value": 1 },
                "DAY_ENERGY": { "Unit": "Wh", "Value": 1 },
                "YEAR_ENERGY": { "Unit": "Wh", "Value": 1 },
                "TOTAL_ENERGY": { "Unit": "Wh", "Value": 1 }
            }}
        })
        .to_string();

        let reading = decode_realtime(&body).expect("decodes");
        assert_eq!(reading.device_id, "7");
        assert_eq!(reading.captured_at.to_rfc3339(), "2024-06-01T10:00:00+00:00");
    }
}
