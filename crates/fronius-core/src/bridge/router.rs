// ── Command routing ──
//
// One handler per command identifier. Handlers contain their own
// failures: a bad message is logged (and answered where a reply is
// expected) and the router carries on with the next one.

use tracing::{debug, info, warn};

use fronius_api::DigestClient;

use super::{Bridge, BridgeState};
use crate::bus::{BusMessage, Outbound};
use crate::command::{CommandKind, ControlAction};
use crate::config::{BridgeSettings, SettingsUpdate};
use crate::error::CoreError;
use crate::logging::{level_name, parse_level};
use crate::model::report::DEVICE_ADDRESS;
use crate::model::{
    AppManifest, ConfigActionReport, ConfigReport, ConnectivityState, ExtendedReport,
    StateReport,
};
use crate::publish::{
    config_action_message, config_message, exclusion_message, extended_report_message,
    inclusion_message, log_level_message, manifest_message, measurement_report, state_message,
};

impl Bridge {
    /// Route one inbound message. Unknown identifiers are ignored.
    pub async fn handle(&self, msg: BusMessage) {
        let Some(kind) = CommandKind::parse(&msg.msg_type) else {
            debug!(msg_type = %msg.msg_type, "ignoring unknown command");
            return;
        };
        debug!(command = %kind, uid = %msg.uid, "routing command");

        if let Some(action) = kind.control_action() {
            self.handle_control(&msg, action).await;
            return;
        }

        match kind {
            CommandKind::Inclusion | CommandKind::GetInclusionReport => {
                self.handle_inclusion(&msg).await;
            }
            CommandKind::Delete => self.handle_delete(&msg).await,
            CommandKind::Uninstall => self.exclude(&msg, DEVICE_ADDRESS).await,
            CommandKind::ExtendedSet => self.handle_extended_set(&msg).await,
            CommandKind::GetExtendedReport => self.handle_extended_report(&msg).await,
            CommandKind::SetLogLevel => self.handle_set_level(&msg).await,
            CommandKind::GetState => self.handle_get_state(&msg).await,
            CommandKind::GetManifest => self.handle_get_manifest(&msg).await,
            CommandKind::GetMeterReport => self.handle_meter_report().await,
            CommandKind::ForcedBatteryStoragePrestart
            | CommandKind::ForcedBatteryStorage
            | CommandKind::ForcedBatteryStorageFinished
            | CommandKind::ExcessSolarProductionEnabled
            | CommandKind::ExcessSolarProductionDisabled => {}
        }
    }

    // ── Control actions ──────────────────────────────────────────

    async fn handle_control(&self, msg: &BusMessage, action: ControlAction) {
        let op = action.command();
        let report = match self.run_control(action).await {
            Ok(()) => {
                info!(op, "control action accepted");
                ConfigActionReport::ok(op)
            }
            Err(e) => {
                warn!(op, error = %e, "control action failed");
                ConfigActionReport::error(op, e.code(), e.to_string())
            }
        };
        self.publish(Outbound::reply(msg, config_action_message(&report)))
            .await;
    }

    /// Issue every step of `action`, stopping at the first failure.
    pub async fn run_control(&self, action: ControlAction) -> Result<(), CoreError> {
        let settings = self.settings().await;
        if !settings.is_configured() {
            return Err(CoreError::Unconfigured);
        }

        let base_url = fronius_api::base_url(&settings.host)?;
        let client = DigestClient::with_client(
            self.inner.http.clone(),
            base_url,
            settings.credentials(),
        );

        for step in action.steps() {
            debug!(path = step.path, body = step.body, "control step");
            if !client.send(step.path, step.body.as_bytes()).await? {
                return Err(CoreError::Rejected {
                    message: format!("{} refused the write", step.path),
                });
            }
        }
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────

    async fn handle_inclusion(&self, msg: &BusMessage) {
        let report = self.inner.state.lock().await.lifecycle.include();
        info!("inclusion requested");
        self.publish(Outbound::reply(msg, inclusion_message(&report)))
            .await;
    }

    async fn handle_delete(&self, msg: &BusMessage) {
        let Some(val) = msg.str_map_value() else {
            warn!("malformed delete payload, ignored");
            return;
        };
        let Some(address) = val.get("address") else {
            warn!("delete without address, ignored");
            return;
        };
        self.exclude(msg, address).await;
    }

    async fn exclude(&self, msg: &BusMessage, address: &str) {
        let (report, settings) = {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;
            let report = state.lifecycle.on_delete(&mut state.settings, address);
            state.generation += 1;
            (report, state.settings.clone())
        };

        if let Err(e) = self.save_settings(settings).await {
            warn!(error = %e, "failed to persist settings after exclusion");
        }
        info!(address, "device excluded, host reset");
        self.publish(Outbound::reply(msg, exclusion_message(&report)))
            .await;
    }

    // ── Configuration ────────────────────────────────────────────

    async fn handle_extended_set(&self, msg: &BusMessage) {
        let report = match self.apply_update(msg).await {
            Ok(()) => ConfigReport {
                op_status: "ok".into(),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "configuration update rejected");
                ConfigReport {
                    op_status: "error".into(),
                    error: Some(e.to_string()),
                }
            }
        };
        self.publish(Outbound::reply(msg, config_message(&report)))
            .await;
    }

    /// Validate, persist, then swap in the new settings. A valid update
    /// is also the manual reconnect path.
    ///
    /// The lock is not held across the write. Commands run one at a time,
    /// so nothing else changes the settings in between.
    async fn apply_update(&self, msg: &BusMessage) -> Result<(), CoreError> {
        let update: SettingsUpdate =
            msg.object_value().map_err(|e| CoreError::ConfigInvalid {
                message: e.to_string(),
            })?;

        let next = update.apply(&self.settings().await)?;
        self.save_settings(next.clone()).await?;

        let mut state = self.inner.state.lock().await;
        state.connectivity = if next.is_configured() {
            ConnectivityState::Connected
        } else {
            ConnectivityState::Disconnected
        };
        state.settings = next;
        state.generation += 1;
        info!(host = %state.settings.host, "settings updated");
        Ok(())
    }

    async fn handle_extended_report(&self, msg: &BusMessage) {
        let report = extended_report(&self.settings().await);
        self.publish(Outbound::reply(msg, extended_report_message(&report)))
            .await;
    }

    async fn handle_set_level(&self, msg: &BusMessage) {
        let requested = msg.str_value().and_then(parse_level);

        let applied = match requested {
            Some(level) => match self.inner.log_control.set_level(level) {
                Ok(()) => Some(level_name(level)),
                Err(e) => {
                    warn!(error = %e, "failed to change log level");
                    None
                }
            },
            None => {
                warn!(requested = ?msg.val, "unknown log level");
                None
            }
        };

        let reply = match applied {
            Some(name) => {
                info!(level = %name, "log level changed");
                let settings = {
                    let mut state = self.inner.state.lock().await;
                    state.settings.log_level.clone_from(&name);
                    state.settings.clone()
                };
                if let Err(e) = self.save_settings(settings).await {
                    warn!(error = %e, "failed to persist log level");
                }
                log_level_message(&name, true)
            }
            None => log_level_message(&self.settings().await.log_level, false),
        };

        self.publish(Outbound::reply(msg, reply)).await;
    }

    // ── Queries ──────────────────────────────────────────────────

    async fn handle_get_state(&self, msg: &BusMessage) {
        let report = state_report(&*self.inner.state.lock().await);
        self.publish(Outbound::reply(msg, state_message(&report)))
            .await;
    }

    /// `val` is the mode; `manifest_state` adds the live state sections.
    async fn handle_get_manifest(&self, msg: &BusMessage) {
        let Some(mode) = msg.str_value() else {
            warn!(val = ?msg.val, "manifest request without a mode, ignored");
            return;
        };

        let mut manifest = AppManifest::descriptor();
        if mode == "manifest_state" {
            let state = self.inner.state.lock().await;
            manifest =
                manifest.with_state(state_report(&state), extended_report(&state.settings));
        }
        self.publish(Outbound::reply(msg, manifest_message(&manifest)))
            .await;
    }

    /// Re-send the last reading. Never publishes for a device that is not
    /// included.
    async fn handle_meter_report(&self) {
        let reading = {
            let state = self.inner.state.lock().await;
            if state.lifecycle.is_included() {
                state.last_reading.clone()
            } else {
                None
            }
        };
        match reading {
            Some(reading) => self.publish(measurement_report(&reading)).await,
            None => debug!("no publishable reading, meter report request ignored"),
        }
    }
}

fn state_report(state: &BridgeState) -> StateReport {
    StateReport {
        connection: state.connectivity.to_string(),
        inclusion: state.lifecycle.inclusion().to_string(),
        config: if state.settings.is_configured() {
            "configured".into()
        } else {
            "not_configured".into()
        },
    }
}

fn extended_report(settings: &BridgeSettings) -> ExtendedReport {
    use secrecy::ExposeSecret;

    ExtendedReport {
        host: settings.host.clone(),
        username: settings.username.clone(),
        password_set: !settings.password.expose_secret().is_empty(),
        poll_interval_secs: settings.poll_interval.as_secs(),
        request_timeout_secs: settings.request_timeout.as_secs(),
        log_level: settings.log_level.clone(),
        data_source: settings.data_source,
    }
}
