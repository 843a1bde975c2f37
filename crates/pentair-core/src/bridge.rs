// ── Bridge ──
//
// Lifecycle of one cloud-to-MQTT bridge: log in, pick the monitored
// device, announce it, then poll it on a fixed interval. A failed tick
// throws the whole client away and logs in again; nothing is retried
// within a tick and nothing from a failed tick is published.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use pentair_api::{CloudClient, CredentialProvider, Device, ListedDevice, Profile, TransportConfig};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::Publisher;
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::sensor::{self, Telemetry};

/// Payload Home Assistant publishes on its status topic when it starts.
const ONLINE: &str = "online";

// ── BridgeState ──────────────────────────────────────────────────

/// Lifecycle phase, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Bootstrapping,
    PublishingInitialState,
    Polling,
    Reauthenticating,
    Stopped,
}

// ── Bridge ───────────────────────────────────────────────────────

/// Cheaply cloneable handle to the bridge.
///
/// The active [`CloudClient`] (and with it the credentials) and the latest
/// device snapshot are held in `ArcSwapOption`s: a re-login replaces them
/// in one atomic swap and readers on other tasks never see a half-updated
/// value.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    transport: TransportConfig,
    provider: CredentialProvider,
    state: watch::Sender<BridgeState>,
    client: ArcSwapOption<CloudClient>,
    device: ArcSwapOption<Device>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Create a bridge. Does no I/O; call [`bootstrap`](Self::bootstrap).
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::default().with_timeout(config.request_timeout);
        let provider = CredentialProvider::new(config.cognito.clone(), &transport)?;
        let (state, _) = watch::channel(BridgeState::Idle);

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                transport,
                provider,
                state,
                client: ArcSwapOption::empty(),
                device: ArcSwapOption::empty(),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn state(&self) -> BridgeState {
        *self.inner.state.borrow()
    }

    /// Latest device snapshot, if bootstrapped.
    pub fn device(&self) -> Option<Arc<Device>> {
        self.inner.device.load_full()
    }

    fn set_state(&self, state: BridgeState) {
        let previous = self.inner.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "bridge state changed");
        }
    }

    // ── Bootstrapping ────────────────────────────────────────────

    /// Log in, select the monitored device and fetch its first snapshot.
    ///
    /// Fails with [`CoreError::NoMonitoredDevice`] when the account has no
    /// device of the configured model.
    pub async fn bootstrap(&self) -> Result<Arc<Device>, CoreError> {
        self.set_state(BridgeState::Bootstrapping);
        let config = &self.inner.config;

        let client = self.authenticate().await?;
        let listed = client.list_devices().await?;
        let target = select_monitored_device(&listed, &config.device_model).ok_or_else(|| {
            CoreError::NoMonitoredDevice {
                model: config.device_model.clone(),
            }
        })?;
        info!(
            device_id = %target.device_id,
            name = %target.product_info.nick_name,
            "selected monitored device"
        );

        let device = Arc::new(client.get_device(&target.device_id).await?);
        self.inner.device.store(Some(Arc::clone(&device)));
        Ok(device)
    }

    /// Full credential exchange; the new client replaces the old one.
    async fn authenticate(&self) -> Result<Arc<CloudClient>, CoreError> {
        let config = &self.inner.config;
        let credentials = self
            .inner
            .provider
            .login(&config.account.username, &config.account.password)
            .await?;

        let client = Arc::new(CloudClient::new(
            config.api_base_url.clone(),
            credentials,
            &self.inner.transport,
        )?);
        self.inner.client.store(Some(Arc::clone(&client)));
        Ok(client)
    }

    /// Account profile through the current client. Used as a health check.
    pub async fn profile(&self) -> Result<Profile, CoreError> {
        let client = self.current_client()?;
        Ok(client.get_profile().await?)
    }

    fn current_client(&self) -> Result<Arc<CloudClient>, CoreError> {
        self.inner
            .client
            .load_full()
            .ok_or_else(|| CoreError::Internal("bridge is not bootstrapped".into()))
    }

    // ── Running ──────────────────────────────────────────────────

    /// Announce the device, publish its first state and spawn the
    /// background tasks.
    ///
    /// Publishing failures here are returned: without a working broker
    /// there is no bridge. `status_messages`, when given, feeds the
    /// listener that re-announces the device whenever Home Assistant
    /// comes online.
    pub async fn start(
        &self,
        publisher: Arc<dyn Publisher>,
        status_messages: Option<broadcast::Receiver<String>>,
    ) -> Result<(), CoreError> {
        let device = self
            .device()
            .ok_or_else(|| CoreError::Internal("bridge is not bootstrapped".into()))?;

        self.set_state(BridgeState::PublishingInitialState);
        self.publish_discovery(publisher.as_ref(), &device).await?;
        self.publish_state(publisher.as_ref(), &device).await?;

        // before spawning, so the poll task's own transitions win
        self.set_state(BridgeState::Polling);

        let mut handles = self.inner.task_handles.lock().await;
        let cancel = self.inner.cancel.clone();

        handles.push(tokio::spawn(poll_task(
            self.clone(),
            Arc::clone(&publisher),
            device.device_id.clone(),
            cancel.clone(),
        )));

        if let Some(rx) = status_messages {
            handles.push(tokio::spawn(status_task(
                self.clone(),
                Arc::clone(&publisher),
                rx,
                cancel,
            )));
        }

        info!(
            device_id = %device.device_id,
            interval_secs = self.inner.config.poll_interval.as_secs(),
            "polling started"
        );
        Ok(())
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.set_state(BridgeState::Stopped);
        debug!("bridge stopped");
    }

    /// One tick: fetch a fresh snapshot and publish it.
    pub async fn poll_once(
        &self,
        publisher: &dyn Publisher,
        device_id: &str,
    ) -> Result<(), CoreError> {
        let client = self.current_client()?;
        let device = client.get_device(device_id).await?;
        let telemetry = Telemetry::from_device(&device)?;

        self.inner.device.store(Some(Arc::new(device)));
        self.publish(
            publisher,
            &sensor::state_topic(&self.inner.config.state_topic_prefix, device_id),
            telemetry.to_payload()?,
        )
        .await
    }

    /// Replace the cloud client after a failed tick.
    async fn reauthenticate(&self) -> Result<(), CoreError> {
        self.set_state(BridgeState::Reauthenticating);
        match self.authenticate().await {
            Ok(_) => {
                info!("re-authenticated with Pentair cloud");
                self.set_state(BridgeState::Polling);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "re-authentication failed, retrying next tick");
                Err(e)
            }
        }
    }

    // ── Publishing ───────────────────────────────────────────────

    /// One discovery config per metric.
    pub async fn publish_discovery(
        &self,
        publisher: &dyn Publisher,
        device: &Device,
    ) -> Result<(), CoreError> {
        let config = &self.inner.config;
        for sensor_config in sensor::discovery_configs(device, &config.state_topic_prefix) {
            let topic = sensor_config.discovery_topic(&config.discovery_prefix);
            self.publish(publisher, &topic, sensor_config.to_payload()?)
                .await?;
            debug!(%topic, "published sensor config");
        }
        Ok(())
    }

    async fn publish_state(&self, publisher: &dyn Publisher, device: &Device) -> Result<(), CoreError> {
        let telemetry = Telemetry::from_device(device)?;
        let topic = sensor::state_topic(&self.inner.config.state_topic_prefix, &device.device_id);
        self.publish(publisher, &topic, telemetry.to_payload()?).await
    }

    /// Nothing leaves the bridge once shutdown has begun.
    async fn publish(
        &self,
        publisher: &dyn Publisher,
        topic: &str,
        payload: Vec<u8>,
    ) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            debug!(topic, "shutting down, publish dropped");
            return Ok(());
        }
        publisher.publish(topic, payload).await
    }
}

/// First listed device whose model matches, in list order.
pub fn select_monitored_device<'a>(
    devices: &'a [ListedDevice],
    model: &str,
) -> Option<&'a ListedDevice> {
    devices.iter().find(|device| device.is_model(model))
}

// ── Background tasks ─────────────────────────────────────────────

/// Fixed-interval polling. A failed tick triggers one immediate
/// re-login; if that fails too, the next tick logs in before polling.
async fn poll_task(
    bridge: Bridge,
    publisher: Arc<dyn Publisher>,
    device_id: String,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(bridge.inner.config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    let mut needs_login = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if needs_login {
                    if bridge.reauthenticate().await.is_err() {
                        continue;
                    }
                    needs_login = false;
                }

                match bridge.poll_once(publisher.as_ref(), &device_id).await {
                    Ok(()) => debug!(%device_id, "published telemetry"),
                    Err(_) if cancel.is_cancelled() => break,
                    Err(e) => {
                        warn!(error = %e, %device_id, "poll failed, re-authenticating");
                        needs_login = bridge.reauthenticate().await.is_err();
                    }
                }
            }
        }
    }

    debug!("poll task stopped");
}

/// Re-announce the device whenever Home Assistant reports `online`.
async fn status_task(
    bridge: Bridge,
    publisher: Arc<dyn Publisher>,
    mut rx: broadcast::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = rx.recv() => match message {
                Ok(payload) if payload == ONLINE => {
                    info!("Home Assistant is online, re-sending sensor configs");
                    let Some(device) = bridge.device() else { continue };
                    if let Err(e) = bridge.publish_discovery(publisher.as_ref(), &device).await {
                        warn!(error = %e, "failed to re-send sensor configs");
                    }
                }
                Ok(payload) => debug!(%payload, "ignoring status message"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "status listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    debug!("status listener stopped");
}
