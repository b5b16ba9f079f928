// ── Bridge abstraction ──
//
// Full lifecycle of one inverter bridge: the shared state object, the
// polling task, the command processor, and the outbound message channel
// the transport drains.

mod poll;
mod router;

pub use poll::PollOutcome;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fronius_api::TransportConfig;

use crate::bus::{BusMessage, Outbound};
use crate::config::BridgeSettings;
use crate::error::CoreError;
use crate::lifecycle::Lifecycle;
use crate::logging::LogLevelControl;
use crate::model::{ConnectivityState, InclusionState, NormalizedReading, PersistedSnapshot};
use crate::store::StateStore;

const INBOUND_CHANNEL_SIZE: usize = 64;
const OUTBOUND_CHANNEL_SIZE: usize = 256;

// ── Shared state ─────────────────────────────────────────────────

/// Everything both tasks read or write. Guarded as a whole by one lock.
struct BridgeState {
    settings: BridgeSettings,
    /// Bumped on every settings mutation; lets a poll notice that the
    /// host changed underneath it.
    generation: u64,
    connectivity: ConnectivityState,
    lifecycle: Lifecycle,
    last_reading: Option<NormalizedReading>,
}

impl BridgeState {
    fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            last_reading: self.last_reading.clone(),
            connectivity: self.connectivity,
            inclusion: self.lifecycle.inclusion(),
        }
    }
}

// ── Bridge ───────────────────────────────────────────────────────

/// The main entry point.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Owns the polling engine and
/// the command router; everything published goes through the outbound
/// channel handed out by [`take_outbound()`](Self::take_outbound).
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    state: Mutex<BridgeState>,
    http: reqwest::Client,
    poll_interval: Duration,
    request_timeout: Duration,
    store: Arc<dyn StateStore>,
    log_control: Arc<dyn LogLevelControl>,
    outbound_tx: mpsc::Sender<Outbound>,
    outbound_rx: Mutex<Option<mpsc::Receiver<Outbound>>>,
    inbound_tx: mpsc::Sender<BusMessage>,
    inbound_rx: Mutex<Option<mpsc::Receiver<BusMessage>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Create a bridge from startup settings and the last persisted
    /// snapshot. Does NOT start polling; call [`start()`](Self::start).
    ///
    /// Inclusion and connectivity both resume from the snapshot, so a
    /// restart neither announces the device again nor polls an inverter
    /// that was marked unreachable. Without a configured host the bridge
    /// always starts `Disconnected`.
    pub fn new(
        settings: BridgeSettings,
        snapshot: PersistedSnapshot,
        store: Arc<dyn StateStore>,
        log_control: Arc<dyn LogLevelControl>,
    ) -> Result<Self, CoreError> {
        if settings.poll_interval.is_zero() {
            return Err(CoreError::ConfigInvalid {
                message: "poll interval must be greater than zero".into(),
            });
        }

        let request_timeout = settings.effective_timeout();
        let http = TransportConfig::with_timeout(request_timeout).build_client()?;

        let connectivity = if settings.is_configured() {
            snapshot.connectivity
        } else {
            ConnectivityState::Disconnected
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(BridgeInner {
                poll_interval: settings.poll_interval,
                request_timeout,
                state: Mutex::new(BridgeState {
                    settings,
                    generation: 0,
                    connectivity,
                    lifecycle: Lifecycle::new(snapshot.inclusion),
                    last_reading: snapshot.last_reading,
                }),
                http,
                store,
                log_control,
                outbound_tx,
                outbound_rx: Mutex::new(Some(outbound_rx)),
                inbound_tx,
                inbound_rx: Mutex::new(Some(inbound_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Hand out the receiving end of the outbound channel. Returns `None`
    /// after the first call.
    pub async fn take_outbound(&self) -> Option<mpsc::Receiver<Outbound>> {
        self.inner.outbound_rx.lock().await.take()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the polling task and the command processor. The first poll
    /// runs immediately. Calling this twice is a no-op.
    pub async fn start(&self) {
        let Some(rx) = self.inner.inbound_rx.lock().await.take() else {
            debug!("bridge already started");
            return;
        };

        let mut handles = self.inner.task_handles.lock().await;
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(command_processor_task(
            self.clone(),
            rx,
            cancel.clone(),
        )));
        handles.push(tokio::spawn(poll::poll_task(self.clone(), cancel)));

        info!(
            poll_interval_secs = self.inner.poll_interval.as_secs_f64(),
            request_timeout_ms = u64::try_from(self.inner.request_timeout.as_millis()).unwrap_or(u64::MAX),
            "bridge started"
        );
    }

    /// Stop background tasks. An in-flight poll or command runs to
    /// completion (bounded by the request timeout) before this returns.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        debug!("bridge stopped");
    }

    /// Queue an inbound bus message for the command processor.
    pub async fn submit(&self, msg: BusMessage) -> Result<(), CoreError> {
        self.inner
            .inbound_tx
            .send(msg)
            .await
            .map_err(|_| CoreError::BusClosed)
    }

    // ── State observation ────────────────────────────────────────

    pub async fn connectivity(&self) -> ConnectivityState {
        self.inner.state.lock().await.connectivity
    }

    pub async fn inclusion(&self) -> InclusionState {
        self.inner.state.lock().await.lifecycle.inclusion()
    }

    /// Copy of the current settings.
    pub async fn settings(&self) -> BridgeSettings {
        self.inner.state.lock().await.settings.clone()
    }

    pub async fn last_reading(&self) -> Option<NormalizedReading> {
        self.inner.state.lock().await.last_reading.clone()
    }

    pub async fn snapshot(&self) -> PersistedSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    /// Tick period, fixed at construction.
    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    // ── Internals ────────────────────────────────────────────────

    async fn publish(&self, out: Outbound) {
        debug!(topic = %out.topic, msg_type = %out.message.msg_type, "publishing");
        if self.inner.outbound_tx.send(out).await.is_err() {
            warn!("outbound channel closed, message dropped");
        }
    }

    /// Store writes sync to disk; keep them off the runtime threads.
    async fn store_write<F>(&self, what: &str, write: F) -> Result<(), CoreError>
    where
        F: FnOnce(&dyn StateStore) -> Result<(), CoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.inner.store);
        tokio::task::spawn_blocking(move || write(store.as_ref()))
            .await
            .map_err(|e| CoreError::Persistence {
                what: what.into(),
                message: e.to_string(),
            })?
    }

    async fn save_settings(&self, settings: BridgeSettings) -> Result<(), CoreError> {
        self.store_write("settings", move |store| store.save_settings(&settings))
            .await
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Dispatch inbound messages in arrival order.
async fn command_processor_task(
    bridge: Bridge,
    mut rx: mpsc::Receiver<BusMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                bridge.handle(msg).await;
            }
        }
    }
}
