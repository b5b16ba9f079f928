// ── Runtime bridge settings ──
//
// What the bridge needs to reach the inverter: host, service-account
// credentials and timing. Never touches disk; `fronius-config` builds a
// `BridgeSettings` from the config file and hands it in, and persists
// it back through the `StateStore` trait when a command mutates it.

use std::time::Duration;

use fronius_api::{DataSource, DigestCredentials};
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::CoreError;

/// Host value meaning "no inverter configured". Polling is skipped and
/// control actions fail with `UNCONFIGURED` while it is set.
pub const UNCONFIGURED_HOST: &str = "host_ip";

/// Settings shared between the polling and command tasks.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Inverter host or base URL (e.g. `192.168.1.20`).
    pub host: String,
    /// Service-account user for the digest-protected endpoints.
    pub username: String,
    pub password: SecretString,
    /// Tick period. Fixed for the lifetime of a running bridge.
    pub poll_interval: Duration,
    /// Upper bound for a single HTTP request.
    pub request_timeout: Duration,
    /// Current `tracing` level filter, as configured.
    pub log_level: String,
    /// Endpoint readings are taken from.
    pub data_source: DataSource,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            host: UNCONFIGURED_HOST.into(),
            username: String::new(),
            password: SecretString::from(String::new()),
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            log_level: "info".into(),
            data_source: DataSource::default(),
        }
    }
}

impl BridgeSettings {
    /// Whether an inverter host has been set.
    pub fn is_configured(&self) -> bool {
        let host = self.host.trim();
        !host.is_empty() && host != UNCONFIGURED_HOST
    }

    /// Request timeout actually applied: never more than 4/5 of the poll
    /// period, so a hung request always ends before the next tick is due.
    pub fn effective_timeout(&self) -> Duration {
        self.request_timeout.min(self.poll_interval * 4 / 5)
    }

    /// Credentials for the digest client.
    pub fn credentials(&self) -> DigestCredentials {
        DigestCredentials::new(self.username.clone(), self.password.clone())
    }

    /// Forget the inverter: host goes back to the sentinel.
    pub fn reset_host(&mut self) {
        UNCONFIGURED_HOST.clone_into(&mut self.host);
    }
}

// ── Updates from the hub ─────────────────────────────────────────────

/// `val` of `cmd.config.extended_set`. Omitted credentials keep their
/// current value.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub host: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub data_source: Option<DataSource>,
}

impl SettingsUpdate {
    /// Validate and produce the settings that would result. `current` is
    /// left untouched so a rejected update changes nothing.
    pub fn apply(&self, current: &BridgeSettings) -> Result<BridgeSettings, CoreError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "host must not be empty".into(),
            });
        }
        if host != UNCONFIGURED_HOST {
            fronius_api::base_url(host).map_err(|e| CoreError::ConfigInvalid {
                message: format!("host {host:?}: {e}"),
            })?;
        }

        let mut next = current.clone();
        host.clone_into(&mut next.host);
        if let Some(ref username) = self.username {
            next.username.clone_from(username);
        }
        if let Some(ref password) = self.password {
            next.password = SecretString::from(password.clone());
        }
        if let Some(source) = self.data_source {
            next.data_source = source;
        }
        Ok(next)
    }
}
