// ── FIMP bus vocabulary ──
//
// The JSON envelope exchanged with the hub, topic construction, and
// reply routing. The transport itself (MQTT) lives in the binary; core
// only produces `Outbound` values and consumes parsed `BusMessage`s.

use std::collections::BTreeMap;

use chrono::Local;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Resource name on the bus.
pub const SERVICE_NAME: &str = "fronius";

/// Adapter instance address.
pub const ADAPTER_ADDRESS: &str = "1";

// ── Topics ───────────────────────────────────────────────────────────

/// Adapter-level events (inclusion, exclusion, command replies).
pub fn adapter_event_topic() -> String {
    format!("pt:j1/mt:evt/rt:ad/rn:{SERVICE_NAME}/ad:{ADAPTER_ADDRESS}")
}

/// Metering events for the inverter device.
pub fn meter_event_topic() -> String {
    format!(
        "pt:j1/mt:evt/rt:dev/rn:{SERVICE_NAME}/ad:{ADAPTER_ADDRESS}/sv:{}/ad:{}",
        crate::model::report::METER_SERVICE,
        crate::model::report::DEVICE_ADDRESS,
    )
}

/// Topics carrying commands for this adapter and its devices.
pub fn command_topics() -> [String; 2] {
    [
        format!("pt:j1/mt:cmd/rt:dev/rn:{SERVICE_NAME}/ad:{ADAPTER_ADDRESS}/#"),
        format!("pt:j1/mt:cmd/rt:ad/rn:{SERVICE_NAME}/ad:{ADAPTER_ADDRESS}"),
    ]
}

// ── Envelope ─────────────────────────────────────────────────────────

/// A FIMP message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub serv: String,
    #[serde(default)]
    pub val_t: String,
    #[serde(default)]
    pub val: serde_json::Value,
    #[serde(default)]
    pub props: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resp_to: Option<String>,
    #[serde(default)]
    pub src: String,
    #[serde(default = "default_version")]
    pub ver: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corid: Option<String>,
    #[serde(default)]
    pub ctime: String,
}

fn default_version() -> String {
    "1".into()
}

impl BusMessage {
    /// New message originating from this bridge, with a fresh `uid`.
    pub fn new(msg_type: &str, serv: &str, val_t: &str, val: serde_json::Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            serv: serv.into(),
            val_t: val_t.into(),
            val,
            props: None,
            tags: None,
            resp_to: None,
            src: SERVICE_NAME.into(),
            ver: default_version(),
            uid: uuid::Uuid::new_v4().to_string(),
            corid: None,
            ctime: Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string(),
        }
    }

    /// Object-typed message from any serializable payload.
    pub fn object<T: Serialize>(msg_type: &str, serv: &str, val: &T) -> Self {
        let val = serde_json::to_value(val).unwrap_or(serde_json::Value::Null);
        Self::new(msg_type, serv, "object", val)
    }

    /// Attach a single property.
    pub fn with_prop(mut self, key: &str, value: &str) -> Self {
        self.props
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Correlate this message with the request it answers.
    pub fn correlated_with(mut self, request: &BusMessage) -> Self {
        if !request.uid.is_empty() {
            self.corid = Some(request.uid.clone());
        }
        self
    }

    /// Parse a raw payload as received from the transport.
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Serialize for the transport.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    // ── Value accessors ──────────────────────────────────────────────

    /// `val` as a string (`val_t: string`).
    pub fn str_value(&self) -> Option<&str> {
        self.val.as_str()
    }

    /// `val` as a string map (`val_t: str_map`).
    pub fn str_map_value(&self) -> Option<BTreeMap<String, String>> {
        serde_json::from_value(self.val.clone()).ok()
    }

    /// `val` decoded into a typed object (`val_t: object`).
    pub fn object_value<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.val.clone())
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// A message ready to publish, with its destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub topic: String,
    pub message: BusMessage,
}

impl Outbound {
    /// Event on the adapter topic.
    pub fn adapter(message: BusMessage) -> Self {
        Self {
            topic: adapter_event_topic(),
            message,
        }
    }

    /// Event on the meter topic.
    pub fn meter(message: BusMessage) -> Self {
        Self {
            topic: meter_event_topic(),
            message,
        }
    }

    /// Reply to `request`: its `resp_to` topic when set, otherwise the
    /// adapter event topic. Carries `corid` = request `uid`.
    pub fn reply(request: &BusMessage, message: BusMessage) -> Self {
        let topic = request
            .resp_to
            .as_deref()
            .filter(|t| !t.is_empty())
            .map_or_else(adapter_event_topic, ToOwned::to_owned);
        Self {
            topic,
            message: message.correlated_with(request),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_hub_command() {
        let raw = br#"{
            "type": "cmd.thing.delete",
            "serv": "fronius",
            "val_t": "str_map",
            "val": { "address": "1" },
            "props": null,
            "tags": null,
            "resp_to": "pt:j1/mt:rsp/rt:app/rn:tplex-ui/ad:1",
            "src": "tplex-ui",
            "ver": "1",
            "uid": "d4d2b9b4-0d51-4a7c-a9b4-7fd5f1f0b2f1",
            "ctime": "2024-06-01T12:00:00.000+02:00"
        }"#;

        let msg = BusMessage::from_slice(raw).unwrap();
        assert_eq!(msg.msg_type, "cmd.thing.delete");
        assert_eq!(msg.str_map_value().unwrap()["address"], "1");
        assert!(msg.str_value().is_none());
    }

    #[test]
    fn minimal_envelope_fills_defaults() {
        let msg = BusMessage::from_slice(br#"{"type":"cmd.app.get_state"}"#).unwrap();
        assert_eq!(msg.ver, "1");
        assert!(msg.uid.is_empty());
        assert_eq!(msg.val, serde_json::Value::Null);
    }

    #[test]
    fn reply_prefers_resp_to() {
        let mut request = BusMessage::new("cmd.app.get_state", SERVICE_NAME, "null", serde_json::Value::Null);
        let reply = BusMessage::new("evt.app.state_report", SERVICE_NAME, "object", serde_json::Value::Null);

        let out = Outbound::reply(&request, reply.clone());
        assert_eq!(out.topic, "pt:j1/mt:evt/rt:ad/rn:fronius/ad:1");
        assert_eq!(out.message.corid.as_deref(), Some(request.uid.as_str()));

        request.resp_to = Some("pt:j1/mt:rsp/rt:app/rn:ui/ad:1".into());
        let out = Outbound::reply(&request, reply);
        assert_eq!(out.topic, "pt:j1/mt:rsp/rt:app/rn:ui/ad:1");
    }

    #[test]
    fn serialized_envelope_uses_type_key() {
        let msg = BusMessage::new("evt.meter_ext.report", "meter_elec", "float_map", serde_json::json!({"p_export": 1.0}))
            .with_prop("unit", "W");
        let json: serde_json::Value = serde_json::from_slice(&msg.to_vec().unwrap()).unwrap();
        assert_eq!(json["type"], "evt.meter_ext.report");
        assert_eq!(json["src"], "fronius");
        assert_eq!(json["props"]["unit"], "W");
        assert!(json.get("resp_to").is_none());
    }

    #[test]
    fn topics_are_scoped_to_this_adapter() {
        assert_eq!(
            meter_event_topic(),
            "pt:j1/mt:evt/rt:dev/rn:fronius/ad:1/sv:meter_elec/ad:1"
        );
        let [dev, ad] = command_topics();
        assert_eq!(dev, "pt:j1/mt:cmd/rt:dev/rn:fronius/ad:1/#");
        assert_eq!(ad, "pt:j1/mt:cmd/rt:ad/rn:fronius/ad:1");
    }
}
