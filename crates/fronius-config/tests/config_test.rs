#![allow(clippy::unwrap_used)]
// File-level tests for config and state persistence, plus a restart
// scenario through `Bridge`.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fronius_config::{
    Config, ConfigError, FileStore, MqttConfig, Paths, load_config, load_snapshot, save_config,
    save_snapshot,
};
use fronius_core::{
    Bridge, ConnectivityState, CoreError, DataSource, InclusionState, LogLevelControl, PersistedSnapshot,
    PollOutcome, StateStore,
};

struct NoopLevels;

impl LogLevelControl for NoopLevels {
    fn set_level(&self, _level: LevelFilter) -> Result<(), CoreError> {
        Ok(())
    }
}

fn write(path: &std::path::Path, body: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

// ── Config file ─────────────────────────────────────────────────────

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());

    let config = load_config(&paths.config_file()).unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.host, "host_ip");
    assert_eq!(config.mqtt.port, 1883);
}

#[test]
fn loads_values_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    write(
        &paths.config_file(),
        r#"
host = "192.168.1.20"
username = "technician"
password = "s3cret"
poll_interval_secs = 15
log_level = "debug"
data_source = "powerflow"

[mqtt]
host = "broker.lan"
port = 1884
username = "bridge"
"#,
    );

    let config = load_config(&paths.config_file()).unwrap();

    assert_eq!(config.host, "192.168.1.20");
    assert_eq!(config.poll_interval_secs, 15);
    assert_eq!(config.request_timeout_secs, 10);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.data_source, DataSource::Powerflow);
    assert_eq!(config.mqtt.host, "broker.lan");
    assert_eq!(config.mqtt.port, 1884);
    assert_eq!(config.mqtt.username.as_deref(), Some("bridge"));
    assert_eq!(config.mqtt.client_id_prefix, "fronius");

    let settings = config.to_settings();
    assert!(settings.is_configured());
    assert_eq!(settings.poll_interval.as_secs(), 15);
}

#[test]
fn invalid_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());

    write(&paths.config_file(), "poll_interval_secs = 0\n");
    let err = load_config(&paths.config_file()).unwrap_err();
    assert!(
        matches!(&err, ConfigError::Validation { field, .. } if field == "poll_interval_secs"),
        "unexpected error: {err}"
    );

    write(&paths.config_file(), "log_level = \"shouty\"\n");
    let err = load_config(&paths.config_file()).unwrap_err();
    assert!(matches!(&err, ConfigError::Validation { field, .. } if field == "log_level"));

    write(&paths.config_file(), "poll_interval_secs = \"often\"\n");
    let err = load_config(&paths.config_file()).unwrap_err();
    assert!(matches!(err, ConfigError::Figment(_)));
}

#[test]
fn save_stamps_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let mut config = Config {
        host: "inverter.lan".into(),
        mqtt: MqttConfig {
            password: Some("broker-pw".into()),
            ..MqttConfig::default()
        },
        ..Config::default()
    };

    save_config(&paths.config_file(), &mut config).unwrap();
    assert_eq!(config.configured_by.as_deref(), Some("auto"));
    assert!(config.configured_at.is_some());

    let reloaded = load_config(&paths.config_file()).unwrap();
    assert_eq!(reloaded, config);
}

// ── State snapshot ──────────────────────────────────────────────────

#[test]
fn missing_snapshot_is_fresh_state() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = load_snapshot(&Paths::new(dir.path()).state_file()).unwrap();

    assert_eq!(snapshot.inclusion, InclusionState::NotIncluded);
    assert!(snapshot.last_reading.is_none());
}

#[test]
fn snapshot_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = Paths::new(dir.path()).state_file();
    let snapshot = PersistedSnapshot {
        inclusion: InclusionState::Included,
        connectivity: ConnectivityState::Disconnected,
        last_reading: None,
    };

    save_snapshot(&path, &snapshot).unwrap();
    let loaded = load_snapshot(&path).unwrap();

    assert_eq!(loaded.inclusion, InclusionState::Included);
    assert_eq!(loaded.connectivity, ConnectivityState::Disconnected);
}

#[test]
fn corrupt_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = Paths::new(dir.path()).state_file();
    write(&path, "{ not json");

    let err = load_snapshot(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Snapshot { .. }));
}

// ── FileStore ───────────────────────────────────────────────────────

#[test]
fn settings_save_keeps_broker_section() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let config = Config {
        mqtt: MqttConfig {
            host: "broker.lan".into(),
            ..MqttConfig::default()
        },
        poll_interval_secs: 20,
        ..Config::default()
    };
    let store = FileStore::new(&paths, config);

    let mut settings = store.config().to_settings();
    settings.host = "10.0.0.7".into();
    store.save_settings(&settings).unwrap();

    let on_disk = load_config(&paths.config_file()).unwrap();
    assert_eq!(on_disk.host, "10.0.0.7");
    assert_eq!(on_disk.mqtt.host, "broker.lan");
    assert_eq!(on_disk.poll_interval_secs, 20);
    assert_eq!(store.config(), on_disk);
}

// ── Restart ─────────────────────────────────────────────────────────

#[tokio::test]
async fn restart_does_not_include_twice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/solar_api/v1/GetInverterRealtimeData.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Head": { "Status": { "Code": 0, "Reason": "" } },
            "Body": { "Data": {
                "PAC": { "Unit": "W", "Values": { "1": 800 } },
                "DAY_ENERGY": { "Unit": "Wh", "Values": { "1": 4000 } },
                "YEAR_ENERGY": { "Unit": "Wh", "Values": { "1": 100_000 } },
                "TOTAL_ENERGY": { "Unit": "Wh", "Values": { "1": 900_000 } }
            }}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let config = Config {
        host: server.uri(),
        ..Config::default()
    };

    // First run: includes on the first reading, persists Included.
    {
        let store = Arc::new(FileStore::new(&paths, config.clone()));
        let snapshot = load_snapshot(&paths.state_file()).unwrap();
        let bridge =
            Bridge::new(config.to_settings(), snapshot, store, Arc::new(NoopLevels)).unwrap();
        let _outbound = bridge.take_outbound().await.unwrap();

        assert_eq!(bridge.poll_once().await, PollOutcome::Published { included: true });
    }

    // Second run resumes from disk.
    let snapshot = load_snapshot(&paths.state_file()).unwrap();
    assert_eq!(snapshot.inclusion, InclusionState::Included);
    assert!(snapshot.last_reading.is_some());

    let store = Arc::new(FileStore::new(&paths, config.clone()));
    let bridge = Bridge::new(config.to_settings(), snapshot, store, Arc::new(NoopLevels)).unwrap();
    let mut outbound = bridge.take_outbound().await.unwrap();

    assert_eq!(bridge.poll_once().await, PollOutcome::Published { included: false });
    let first = outbound.try_recv().unwrap();
    assert_eq!(first.message.msg_type, "evt.meter_ext.report");
}

#[tokio::test]
async fn restart_keeps_unreachable_inverter_suspended() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    let config = Config {
        host: server.uri(),
        ..Config::default()
    };
    save_snapshot(
        &paths.state_file(),
        &PersistedSnapshot {
            inclusion: InclusionState::Included,
            connectivity: ConnectivityState::Disconnected,
            last_reading: None,
        },
    )
    .unwrap();

    let snapshot = load_snapshot(&paths.state_file()).unwrap();
    let store = Arc::new(FileStore::new(&paths, config.clone()));
    let bridge = Bridge::new(config.to_settings(), snapshot, store, Arc::new(NoopLevels)).unwrap();
    let _outbound = bridge.take_outbound().await.unwrap();

    assert_eq!(bridge.connectivity().await, ConnectivityState::Disconnected);
    assert_eq!(bridge.poll_once().await, PollOutcome::Skipped);
    assert_eq!(
        load_snapshot(&paths.state_file()).unwrap().connectivity,
        ConnectivityState::Disconnected
    );
}
