// Hybrid (GEN24) power-flow status
//
// `/status/powerflow` answers without the Solar API envelope: site totals
// under `site`, per-inverter power under `inverters`. Hybrid inverters
// report PV production here when the realtime endpoint only sees the AC
// side.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::Error;
use crate::solar_api::models::{NormalizedReading, decode_error};

#[derive(Debug, Deserialize)]
pub(crate) struct PowerflowResponse {
    #[serde(default)]
    common: PowerflowCommon,
    inverters: Vec<PowerflowInverter>,
    #[serde(default)]
    site: PowerflowSite,
}

#[derive(Debug, Default, Deserialize)]
struct PowerflowCommon {
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PowerflowInverter {
    #[serde(rename = "ID")]
    id: Option<serde_json::Value>,
    /// Watts; null while the inverter sleeps.
    #[serde(rename = "P")]
    power: Option<f64>,
}

/// Site energy counters are null on firmware that does not track them.
#[derive(Debug, Default, Deserialize)]
struct PowerflowSite {
    #[serde(rename = "E_Day")]
    energy_day: Option<f64>,
    #[serde(rename = "E_Year")]
    energy_year: Option<f64>,
    #[serde(rename = "E_Total")]
    energy_total: Option<f64>,
}

impl PowerflowResponse {
    fn normalize(self) -> NormalizedReading {
        let device_id = match self.inverters.first().and_then(|inv| inv.id.as_ref()) {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            _ => "1".to_owned(),
        };
        let captured_at = self
            .common
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map_or_else(Utc::now, |ts| ts.with_timezone(&Utc));

        NormalizedReading {
            power_w: self.inverters.iter().filter_map(|inv| inv.power).sum(),
            energy_today_wh: self.site.energy_day.unwrap_or(0.0),
            energy_year_wh: self.site.energy_year.unwrap_or(0.0),
            energy_total_wh: self.site.energy_total.unwrap_or(0.0),
            frequency_hz: None,
            voltage_ac_v: None,
            current_ac_a: None,
            voltage_dc_v: None,
            current_dc_a: None,
            device_id,
            captured_at,
        }
    }
}

/// Decode a raw `/status/powerflow` body. Power is the sum over all
/// inverters, in watts; energy comes from the site counters, in Wh.
pub fn decode_powerflow(body: &str) -> Result<NormalizedReading, Error> {
    let response: PowerflowResponse =
        serde_json::from_str(body).map_err(|e| decode_error(&e, body))?;
    Ok(response.normalize())
}
