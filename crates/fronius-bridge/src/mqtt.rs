// ── MQTT transport ──
//
// Two tasks around one rumqttc client: the event loop feeds inbound
// command messages to the bridge, the publisher drains the bridge's
// outbound channel.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fronius_config::MqttConfig;
use fronius_core::bus::command_topics;
use fronius_core::{Bridge, BusMessage, Outbound};

const REQUEST_CHANNEL_CAPACITY: usize = 64;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub fn connect(cfg: &MqttConfig) -> (AsyncClient, EventLoop) {
    let client_id = format!("{}-{}", cfg.client_id_prefix, uuid::Uuid::new_v4().simple());
    let mut opts = MqttOptions::new(client_id, cfg.host.as_str(), cfg.port);
    opts.set_keep_alive(KEEP_ALIVE);
    if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
        opts.set_credentials(user.as_str(), pass.as_str());
    }
    info!(host = %cfg.host, port = cfg.port, "connecting to broker");
    AsyncClient::new(opts, REQUEST_CHANNEL_CAPACITY)
}

/// Drive the event loop. Subscribes on every (re)connect and hands each
/// decodable publish to the bridge. Exits once the publisher has sent
/// the final disconnect, or on the first error after `cancel`.
pub async fn run_event_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    bridge: Bridge,
    cancel: CancellationToken,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("broker connected");
                for topic in command_topics() {
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                        warn!(error = %e, topic = %topic, "subscribe failed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match BusMessage::from_slice(&publish.payload) {
                    Ok(msg) => {
                        if bridge.submit(msg).await.is_err() {
                            debug!(topic = %publish.topic, "bridge stopped, message dropped");
                        }
                    }
                    Err(e) => warn!(error = %e, topic = %publish.topic, "undecodable bus message"),
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                if cancel.is_cancelled() {
                    break;
                }
                warn!(error = %e, "broker connection lost, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
    debug!("event loop stopped");
}

/// Publish everything the bridge emits. On `cancel`, flush what is
/// already queued and disconnect.
pub async fn run_publisher(
    client: AsyncClient,
    mut rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            out = rx.recv() => {
                let Some(out) = out else { break };
                publish(&client, out).await;
            }
        }
    }

    while let Ok(out) = rx.try_recv() {
        publish(&client, out).await;
    }
    if let Err(e) = client.disconnect().await {
        debug!(error = %e, "disconnect request not delivered");
    }
}

async fn publish(client: &AsyncClient, out: Outbound) {
    let payload = match out.message.to_vec() {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, topic = %out.topic, "failed to encode bus message");
            return;
        }
    };
    if let Err(e) = client
        .publish(out.topic.as_str(), QoS::AtLeastOnce, false, payload)
        .await
    {
        warn!(error = %e, topic = %out.topic, "publish failed");
    }
}
