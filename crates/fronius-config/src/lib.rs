//! On-disk configuration and state for fronius-bridge.
//!
//! `{workdir}/data/config.toml` (figment: defaults, then the TOML file,
//! then `FRONIUS_*` environment variables), `{workdir}/data/state.json`
//! for the bridge snapshot, atomic writes for both, and translation to
//! `fronius_core::BridgeSettings`.

mod snapshot;
mod store;

pub use snapshot::{load_snapshot, save_snapshot};
pub use store::FileStore;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fronius_core::{BridgeSettings, CoreError, DataSource, UNCONFIGURED_HOST};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("state file {path} is unreadable: {source}")]
    Snapshot {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CoreError::ConfigInvalid {
                message: format!("{field}: {reason}"),
            },
            other => CoreError::Persistence {
                what: "configuration".into(),
                message: other.to_string(),
            },
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// File locations under a work directory.
#[derive(Debug, Clone)]
pub struct Paths {
    workdir: PathBuf,
}

impl Paths {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.workdir.join("data")
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir().join("state.json")
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Inverter host or URL. `host_ip` means not configured yet.
    #[serde(default = "default_host")]
    pub host: String,

    /// Service account for the digest-protected endpoints.
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `solar_api` (realtime data) or `powerflow` (hybrid inverters).
    #[serde(default)]
    pub data_source: DataSource,

    #[serde(default)]
    pub mqtt: MqttConfig,

    /// RFC 3339 time of the last save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_by: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            username: String::new(),
            password: String::new(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            log_level: default_log_level(),
            data_source: DataSource::default(),
            mqtt: MqttConfig::default(),
            configured_at: None,
            configured_by: None,
        }
    }
}

/// Broker connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    pub username: Option<String>,

    pub password: Option<String>,

    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            client_id_prefix: default_client_id_prefix(),
        }
    }
}

fn default_host() -> String {
    UNCONFIGURED_HOST.into()
}
fn default_poll_interval() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}
fn default_mqtt_host() -> String {
    "localhost".into()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_client_id_prefix() -> String {
    "fronius".into()
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from `path` + environment. A missing file is not an
/// error; defaults apply.
///
/// Environment overrides use a double underscore for nesting:
/// `FRONIUS_HOST`, `FRONIUS_POLL_INTERVAL_SECS`, `FRONIUS_MQTT__PORT`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FRONIUS_").split("__"));

    let config: Config = figment.extract()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.poll_interval_secs == 0 {
        return Err(ConfigError::Validation {
            field: "poll_interval_secs".into(),
            reason: "must be at least 1".into(),
        });
    }
    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            field: "request_timeout_secs".into(),
            reason: "must be at least 1".into(),
        });
    }
    if fronius_core::logging::parse_level(&config.log_level).is_none() {
        return Err(ConfigError::Validation {
            field: "log_level".into(),
            reason: format!("unknown level '{}'", config.log_level),
        });
    }
    Ok(())
}

// ── Config saving ───────────────────────────────────────────────────

/// Stamp and atomically write `cfg` to `path`.
pub fn save_config(path: &Path, cfg: &mut Config) -> Result<(), ConfigError> {
    cfg.configured_at = Some(chrono::Utc::now().to_rfc3339());
    cfg.configured_by = Some("auto".into());
    let toml_str = toml::to_string_pretty(cfg)?;
    write_atomic(path, toml_str.as_bytes())
}

/// Write through a temp file in the target directory, then rename over
/// the target. Readers see either the old file or the new one.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ConfigError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ConfigError::Io(e.error))?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Runtime settings for the bridge.
    pub fn to_settings(&self) -> BridgeSettings {
        BridgeSettings {
            host: self.host.clone(),
            username: self.username.clone(),
            password: SecretString::from(self.password.clone()),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            log_level: self.log_level.clone(),
            data_source: self.data_source,
        }
    }

    /// Fold settings the bridge mutated at runtime back into the file
    /// model. Timing fields are startup-only and not touched.
    pub fn apply_settings(&mut self, settings: &BridgeSettings) {
        self.host.clone_from(&settings.host);
        self.username.clone_from(&settings.username);
        settings
            .password
            .expose_secret()
            .clone_into(&mut self.password);
        self.log_level.clone_from(&settings.log_level);
        self.data_source = settings.data_source;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unconfigured() {
        let config = Config::default();
        assert_eq!(config.host, "host_ip");
        assert!(!config.to_settings().is_configured());
        assert_eq!(config.to_settings().poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn settings_round_trip_through_config() {
        let mut config = Config::default();
        let mut settings = config.to_settings();
        settings.host = "192.168.1.20".into();
        settings.password = SecretString::from("pw".to_string());
        settings.log_level = "debug".into();
        settings.poll_interval = Duration::from_secs(999);
        settings.data_source = DataSource::Powerflow;

        config.apply_settings(&settings);

        assert_eq!(config.host, "192.168.1.20");
        assert_eq!(config.password, "pw");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.data_source, DataSource::Powerflow);
    }

    #[test]
    fn validation_rejects_zero_interval_and_bad_level() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(validate(&config), Err(ConfigError::Validation { .. })));

        let config = Config {
            log_level: "chatty".into(),
            ..Config::default()
        };
        assert!(matches!(validate(&config), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn paths_live_under_data() {
        let paths = Paths::new("/opt/fronius");
        assert_eq!(paths.config_file(), PathBuf::from("/opt/fronius/data/config.toml"));
        assert_eq!(paths.state_file(), PathBuf::from("/opt/fronius/data/state.json"));
    }
}
