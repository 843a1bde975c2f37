// ── MQTT broker connection ──
//
// Owns the rumqttc event loop. `connect` does not return until the broker
// has accepted the session, so a bad address or bad credentials fail the
// bootstrap instead of surfacing later. After that the loop reconnects on
// its own; the status subscription is re-issued on every CONNACK because
// sessions are clean.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::BrokerConfig;
use crate::error::CoreError;

const REQUEST_CHANNEL_CAPACITY: usize = 32;
const STATUS_CHANNEL_CAPACITY: usize = 16;
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

// ── Publisher ────────────────────────────────────────────────────────

/// Where the bridge sends its documents.
///
/// Publishing is fire-and-forget (QoS 0) but a publish that cannot even be
/// queued is an error the caller must handle.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), CoreError>;
}

// ── BrokerConnection ─────────────────────────────────────────────────

/// A live MQTT session.
///
/// Cheaply cloneable. The event loop runs on its own task until
/// [`disconnect`](Self::disconnect) is called or the broker rejects a
/// reconnect outright; [`closed`](Self::closed) resolves at that point.
#[derive(Clone)]
pub struct BrokerConnection {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    client: AsyncClient,
    address: String,
    status_tx: broadcast::Sender<String>,
    cancel: CancellationToken,
    closed: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BrokerConnection {
    /// Connect and wait for the broker's CONNACK.
    ///
    /// Fails with [`CoreError::BrokerConnect`] if the broker is unreachable,
    /// refuses the credentials, or does not answer within
    /// `config.connect_timeout`.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, CoreError> {
        let address = config.address();
        let connect_error = |reason: String| CoreError::BrokerConnect {
            address: address.clone(),
            reason,
        };

        if config.client_id.trim().is_empty() {
            return Err(connect_error("client id must not be empty".into()));
        }

        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        options.set_credentials(&config.username, config.password.expose_secret());

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        debug!(%address, client_id = %config.client_id, "connecting to MQTT broker");
        match tokio::time::timeout(config.connect_timeout, wait_for_connack(&mut eventloop)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(connect_error(e.to_string())),
            Err(_) => {
                return Err(connect_error(format!(
                    "no CONNACK within {}s",
                    config.connect_timeout.as_secs()
                )));
            }
        }
        info!(%address, "connected to MQTT broker");

        if let Some(topic) = &config.status_topic {
            client
                .subscribe(topic.as_str(), QoS::AtLeastOnce)
                .await
                .map_err(|e| connect_error(format!("subscribe to {topic}: {e}")))?;
            debug!(topic = %topic, "subscribed to status topic");
        }

        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let closed = CancellationToken::new();

        let handle = tokio::spawn(event_loop_task(
            eventloop,
            client.clone(),
            config.status_topic.clone(),
            config.reconnect_delay,
            status_tx.clone(),
            cancel.clone(),
            closed.clone(),
        ));

        Ok(Self {
            inner: Arc::new(BrokerInner {
                client,
                address,
                status_tx,
                cancel,
                closed,
                task: Mutex::new(Some(handle)),
            }),
        })
    }

    /// `host:port` of the broker.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Payloads received on the status topic from now on.
    pub fn status_messages(&self) -> broadcast::Receiver<String> {
        self.inner.status_tx.subscribe()
    }

    /// Resolves once the event loop has stopped for good.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Send DISCONNECT, then stop the event loop.
    pub async fn disconnect(&self) {
        if let Err(e) = self.inner.client.try_disconnect() {
            debug!(error = %e, "disconnect request not queued");
        }
        if tokio::time::timeout(DISCONNECT_GRACE, self.closed()).await.is_err() {
            debug!("event loop did not stop after DISCONNECT");
        }

        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }
        info!(address = %self.inner.address, "disconnected from MQTT broker");
    }
}

#[async_trait]
impl Publisher for BrokerConnection {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), CoreError> {
        self.inner
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| CoreError::Publish {
                topic: topic.to_owned(),
                reason: e.to_string(),
            })?;
        trace!(topic, "publish queued");
        Ok(())
    }
}

// ── Event loop ───────────────────────────────────────────────────────

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

/// Drive the connection: dispatch status messages, re-subscribe after
/// reconnects, back off between failed attempts.
async fn event_loop_task(
    mut eventloop: EventLoop,
    client: AsyncClient,
    status_topic: Option<String>,
    reconnect_delay: Duration,
    status_tx: broadcast::Sender<String>,
    cancel: CancellationToken,
    closed: CancellationToken,
) {
    let _closed = closed.drop_guard();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("reconnected to MQTT broker");
                        if let Some(topic) = &status_topic {
                            if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                                warn!(error = %e, topic = %topic, "status re-subscribe failed");
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if status_topic.as_deref() == Some(publish.topic.as_str()) {
                            let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                            debug!(%payload, "status message received");
                            // No receivers is fine: the listener is optional.
                            let _ = status_tx.send(payload);
                        } else {
                            trace!(topic = %publish.topic, "ignoring message on unexpected topic");
                        }
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("DISCONNECT sent");
                        break;
                    }
                    Ok(_) => {}
                    Err(ConnectionError::ConnectionRefused(code)) => {
                        error!(?code, "MQTT broker refused the connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, delay_secs = reconnect_delay.as_secs(), "MQTT connection lost, reconnecting");
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(reconnect_delay) => {}
                        }
                    }
                }
            }
        }
    }

    debug!("MQTT event loop stopped");
}
