mod cli;
mod error;
mod logging;
mod mqtt;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fronius_config::{FileStore, Paths, load_config, load_snapshot};
use fronius_core::{Bridge, CoreError};

use crate::cli::Cli;
use crate::error::BridgeError;

/// Upper bound on flushing queued messages to the broker at shutdown.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), BridgeError> {
    let paths = Paths::new(&cli.workdir);
    let config_path = paths.config_file();
    let state_path = paths.state_file();

    let config = load_config(&config_path).map_err(|e| BridgeError::config(&config_path, e))?;
    let snapshot = load_snapshot(&state_path).map_err(|e| BridgeError::state(&state_path, e))?;

    if cli.check {
        println!(
            "configuration OK: host={} poll_interval={}s inclusion={}",
            config.host, config.poll_interval_secs, snapshot.inclusion
        );
        return Ok(());
    }

    let levels = logging::init(cli.verbose, &config.log_level);
    info!(
        workdir = %cli.workdir.display(),
        host = %config.host,
        inclusion = %snapshot.inclusion,
        "starting fronius-bridge"
    );

    let store = Arc::new(FileStore::new(&paths, config.clone()));
    let bridge = Bridge::new(config.to_settings(), snapshot, store, Arc::new(levels))?;
    let outbound = bridge
        .take_outbound()
        .await
        .ok_or_else(|| CoreError::Internal("outbound channel already taken".into()))?;

    let (client, eventloop) = mqtt::connect(&config.mqtt);
    let transport_cancel = CancellationToken::new();
    let event_loop = tokio::spawn(mqtt::run_event_loop(
        client.clone(),
        eventloop,
        bridge.clone(),
        transport_cancel.clone(),
    ));
    let publisher = tokio::spawn(mqtt::run_publisher(
        client,
        outbound,
        transport_cancel.clone(),
    ));

    bridge.start().await;

    shutdown_signal().await;
    info!("shutdown requested");

    // In-flight poll/command first, so its final messages reach the queue.
    bridge.shutdown().await;
    transport_cancel.cancel();

    let flushed = tokio::time::timeout(FLUSH_TIMEOUT, async {
        let _ = publisher.await;
        let _ = event_loop.await;
    })
    .await;
    if flushed.is_err() {
        warn!("broker flush timed out");
    }

    info!("fronius-bridge stopped");
    Ok(())
}

// ── Signals ─────────────────────────────────────────────────────────

/// Resolves on Ctrl+C or, on unix, SIGTERM from a service manager.
async fn shutdown_signal() {
    tokio::select! {
        () = interrupt() => {}
        () = terminate() => {}
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
