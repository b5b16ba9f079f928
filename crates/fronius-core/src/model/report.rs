// ── Report payloads ──
//
// `val` bodies of the object-typed reports the bridge publishes. Field
// names follow the FIMP vocabulary the hub expects.

use std::collections::BTreeMap;

use fronius_api::DataSource;
use serde::{Deserialize, Serialize};

use crate::bus::{ADAPTER_ADDRESS, SERVICE_NAME};

/// Address the inverter is known by on the bus.
pub const DEVICE_ADDRESS: &str = "1";

/// Metering service name.
pub const METER_SERVICE: &str = "meter_elec";

/// Control service name (battery forcing, export limit).
pub const CONTROL_SERVICE: &str = "inverter_ctrl";

// ── Inclusion ────────────────────────────────────────────────────────

/// One message an interface accepts (`in`) or emits (`out`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub intf_t: String,
    pub msg_t: String,
    pub val_t: String,
    pub ver: String,
}

impl Interface {
    fn inbound(msg_t: &str, val_t: &str) -> Self {
        Self {
            intf_t: "in".into(),
            msg_t: msg_t.into(),
            val_t: val_t.into(),
            ver: "1".into(),
        }
    }

    fn outbound(msg_t: &str, val_t: &str) -> Self {
        Self {
            intf_t: "out".into(),
            ..Self::inbound(msg_t, val_t)
        }
    }
}

/// A capability set exposed by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub alias: String,
    pub address: String,
    pub enabled: bool,
    pub groups: Vec<String>,
    pub props: BTreeMap<String, serde_json::Value>,
    pub interfaces: Vec<Interface>,
}

/// Device descriptor announced once when the inverter joins the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusionReport {
    pub address: String,
    pub product_hash: String,
    pub product_name: String,
    pub manufacturer_id: String,
    pub device_id: String,
    pub comm_tech: String,
    pub hw_ver: String,
    pub sw_ver: String,
    pub power_source: String,
    pub wakeup_interval: String,
    pub groups: Vec<String>,
    pub services: Vec<Service>,
}

impl InclusionReport {
    /// The fixed capability descriptor. Not derived from any reading.
    pub fn descriptor() -> Self {
        Self {
            address: DEVICE_ADDRESS.into(),
            product_hash: SERVICE_NAME.into(),
            product_name: "Fronius inverter".into(),
            manufacturer_id: SERVICE_NAME.into(),
            device_id: DEVICE_ADDRESS.into(),
            comm_tech: "wifi".into(),
            hw_ver: "1".into(),
            sw_ver: "1".into(),
            power_source: "AC".into(),
            wakeup_interval: "-1".into(),
            groups: vec!["ch_0".into()],
            services: vec![meter_service(), control_service()],
        }
    }
}

fn service_address(service: &str) -> String {
    format!("/rt:dev/rn:{SERVICE_NAME}/ad:{ADAPTER_ADDRESS}/sv:{service}/ad:{DEVICE_ADDRESS}")
}

fn meter_service() -> Service {
    let mut props = BTreeMap::new();
    props.insert("sup_units".into(), serde_json::json!(["W", "kWh", "A", "V"]));
    props.insert(
        "sup_extended_vals".into(),
        serde_json::json!(["p_export", "last_e_export", "freq", "u1", "i1"]),
    );

    Service {
        name: METER_SERVICE.into(),
        alias: "meter_elec".into(),
        address: service_address(METER_SERVICE),
        enabled: true,
        groups: vec!["ch_0".into()],
        props,
        interfaces: vec![
            Interface::inbound("cmd.meter_ext.get_report", "null"),
            Interface::outbound("evt.meter_ext.report", "float_map"),
        ],
    }
}

fn control_service() -> Service {
    let mut interfaces: Vec<Interface> = crate::command::ControlAction::ALL
        .iter()
        .map(|action| Interface::inbound(action.command(), "null"))
        .collect();
    interfaces.push(Interface::outbound("evt.app.config_action_report", "object"));

    Service {
        name: CONTROL_SERVICE.into(),
        alias: "inverter control".into(),
        address: service_address(CONTROL_SERVICE),
        enabled: true,
        groups: vec!["ch_0".into()],
        props: BTreeMap::new(),
        interfaces,
    }
}

// ── Exclusion ────────────────────────────────────────────────────────

/// Announces that a device left the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionReport {
    pub address: String,
}

// ── Command replies ──────────────────────────────────────────────────

/// Outcome of a control action (`evt.app.config_action_report`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigActionReport {
    pub op: String,
    pub op_status: String,
    pub next: String,
    pub error_code: String,
    pub error_text: String,
}

impl ConfigActionReport {
    pub fn ok(op: &str) -> Self {
        Self {
            op: op.into(),
            op_status: "ok".into(),
            next: "reload".into(),
            error_code: String::new(),
            error_text: String::new(),
        }
    }

    pub fn error(op: &str, code: &str, text: String) -> Self {
        Self {
            op_status: "error".into(),
            error_code: code.into(),
            error_text: text,
            ..Self::ok(op)
        }
    }
}

/// Reply to `cmd.config.extended_set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigReport {
    pub op_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Current settings with the password withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedReport {
    pub host: String,
    pub username: String,
    pub password_set: bool,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub data_source: DataSource,
}

/// Reply to `cmd.app.get_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    pub connection: String,
    pub inclusion: String,
    pub config: String,
}

// ── Manifest ─────────────────────────────────────────────────────────

/// One editable setting as the hub's configuration UI shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigField {
    pub id: String,
    pub val_t: String,
    pub label: String,
    pub required: bool,
}

impl ConfigField {
    fn new(id: &str, val_t: &str, label: &str, required: bool) -> Self {
        Self {
            id: id.into(),
            val_t: val_t.into(),
            label: label.into(),
            required,
        }
    }
}

/// Reply to `cmd.app.get_manifest`. The state sections are only filled
/// when the request asks for `manifest_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppManifest {
    pub configs: Vec<ConfigField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_state: Option<StateReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_state: Option<ExtendedReport>,
}

impl AppManifest {
    /// The settings `cmd.config.extended_set` accepts.
    pub fn descriptor() -> Self {
        Self {
            configs: vec![
                ConfigField::new("host", "string", "Inverter address", true),
                ConfigField::new("username", "string", "Service user", false),
                ConfigField::new("password", "string", "Service password", false),
                ConfigField::new("log_level", "string", "Log level", false),
                ConfigField::new("data_source", "string", "Data source", false),
            ],
            app_state: None,
            config_state: None,
        }
    }

    pub fn with_state(mut self, app_state: StateReport, config_state: ExtendedReport) -> Self {
        self.app_state = Some(app_state);
        self.config_state = Some(config_state);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_has_meter_and_control_services() {
        let report = InclusionReport::descriptor();
        let names: Vec<&str> = report.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["meter_elec", "inverter_ctrl"]);
        assert_eq!(report.address, "1");
        assert_eq!(
            report.services[0].address,
            "/rt:dev/rn:fronius/ad:1/sv:meter_elec/ad:1"
        );

        let control = &report.services[1];
        assert!(
            control
                .interfaces
                .iter()
                .any(|i| i.msg_t == "cmd.system.forced_battery_storage")
        );
    }

    #[test]
    fn action_report_serializes_all_fields() {
        let json = serde_json::to_value(ConfigActionReport::error(
            "cmd.system.forced_battery_storage",
            "AUTH_REJECTED",
            "denied".into(),
        ))
        .unwrap();
        assert_eq!(json["op_status"], "error");
        assert_eq!(json["next"], "reload");
        assert_eq!(json["error_code"], "AUTH_REJECTED");
        assert_eq!(json["error_text"], "denied");
    }

    #[test]
    fn bare_manifest_omits_state_sections() {
        let json = serde_json::to_value(AppManifest::descriptor()).unwrap();
        assert!(json.get("app_state").is_none());
        assert!(json.get("config_state").is_none());

        let ids: Vec<&str> = json["configs"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f["id"].as_str())
            .collect();
        assert_eq!(ids, ["host", "username", "password", "log_level", "data_source"]);
    }
}
