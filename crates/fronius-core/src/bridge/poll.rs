// ── Polling engine ──
//
// One tick: snapshot settings, fetch, apply the outcome under the state
// lock, then publish once the lock is released. The snapshot is persisted
// after every tick, whatever happened.

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fronius_api::SolarApiClient;

use super::{Bridge, BridgeState};
use crate::bus::Outbound;
use crate::config::BridgeSettings;
use crate::model::{ConnectivityState, NormalizedReading};
use crate::publish::{inclusion_message, measurement_report};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No host configured, or the inverter is marked disconnected.
    Skipped,
    /// A reading was published; `included` when it also included the device.
    Published { included: bool },
    /// Settings changed while the fetch was in flight; the reading was dropped.
    Discarded,
    /// The fetch failed; `disconnected` when it was a transport failure.
    Failed { disconnected: bool },
}

impl Bridge {
    /// Run one polling cycle.
    pub async fn poll_once(&self) -> PollOutcome {
        let outcome = self.poll_cycle().await;
        debug!(?outcome, "poll tick complete");
        self.persist_snapshot().await;
        outcome
    }

    async fn poll_cycle(&self) -> PollOutcome {
        let (settings, generation) = {
            let state = self.inner.state.lock().await;
            if !state.settings.is_configured() {
                debug!("inverter not configured, poll skipped");
                return PollOutcome::Skipped;
            }
            if state.connectivity == ConnectivityState::Disconnected {
                debug!("inverter disconnected, poll skipped");
                return PollOutcome::Skipped;
            }
            (state.settings.clone(), state.generation)
        };

        let result = self.fetch(&settings).await;

        let mut pending = Vec::with_capacity(2);
        let outcome = {
            let mut state = self.inner.state.lock().await;
            if state.generation != generation {
                info!(host = %settings.host, "settings changed during poll, result discarded");
                return PollOutcome::Discarded;
            }
            apply_result(&mut state, result, &settings, &mut pending)
        };

        // The outbound channel is bounded; never wait on it under the lock.
        for out in pending {
            self.publish(out).await;
        }
        outcome
    }

    async fn fetch(&self, settings: &BridgeSettings) -> Result<NormalizedReading, fronius_api::Error> {
        let base_url = fronius_api::base_url(&settings.host)?;
        let client = SolarApiClient::with_client(self.inner.http.clone(), base_url);
        let timeout = self.inner.request_timeout;

        tokio::time::timeout(timeout, client.fetch_reading(settings.data_source))
            .await
            .map_err(|_| fronius_api::Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })?
    }

    async fn persist_snapshot(&self) {
        let snapshot = self.inner.state.lock().await.snapshot();
        let saved = self
            .store_write("snapshot", move |store| store.save_snapshot(&snapshot))
            .await;
        if let Err(e) = saved {
            warn!(error = %e, "failed to persist snapshot");
        }
    }
}

/// Fold a fetch result into the state. Messages to publish are pushed to
/// `pending` in order.
fn apply_result(
    state: &mut BridgeState,
    result: Result<NormalizedReading, fronius_api::Error>,
    settings: &BridgeSettings,
    pending: &mut Vec<Outbound>,
) -> PollOutcome {
    match result {
        Ok(reading) => {
            state.connectivity = ConnectivityState::Connected;
            let decision = state.lifecycle.on_reading(&reading);

            let included = decision.inclusion.is_some();
            if let Some(report) = decision.inclusion {
                pending.push(Outbound::adapter(inclusion_message(&report)));
            }
            if decision.should_publish {
                pending.push(measurement_report(&reading));
            }
            state.last_reading = Some(reading);
            PollOutcome::Published { included }
        }
        Err(e) if e.is_transport() => {
            warn!(error = %e, host = %settings.host, "inverter unreachable, polling suspended");
            state.connectivity = ConnectivityState::Disconnected;
            PollOutcome::Failed { disconnected: true }
        }
        Err(e) => {
            warn!(error = %e, host = %settings.host, "poll failed");
            PollOutcome::Failed {
                disconnected: false,
            }
        }
    }
}

/// Tick forever until cancelled. A tick that comes due while a poll is
/// still running is skipped, never queued.
pub(super) async fn poll_task(bridge: Bridge, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(bridge.inner.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                bridge.poll_once().await;
            }
        }
    }
}
