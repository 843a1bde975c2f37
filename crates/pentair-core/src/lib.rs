//! Bridge between `pentair-api` and an MQTT broker.
//!
//! This crate owns the bridge lifecycle and everything that leaves the
//! process over MQTT:
//!
//! - **[`Bridge`]** - the lifecycle facade. [`bootstrap()`](Bridge::bootstrap)
//!   logs in and picks the monitored device, [`start()`](Bridge::start)
//!   announces it and spawns the poll and status tasks,
//!   [`shutdown()`](Bridge::shutdown) cancels them. A failed poll replaces
//!   the whole cloud client with a freshly authenticated one.
//!
//! - **[`BrokerConnection`]** - the `rumqttc` session. Implements
//!   [`Publisher`], the one seam the bridge publishes through, and exposes
//!   Home Assistant status messages as a broadcast stream.
//!
//! - **Sensor mapping** ([`sensor`]) - pure translation from a device
//!   snapshot to the telemetry payload and the discovery configs.

pub mod bridge;
pub mod broker;
pub mod config;
pub mod error;
pub mod sensor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, BridgeState, select_monitored_device};
pub use broker::{BrokerConnection, Publisher};
pub use config::{AccountCredentials, BridgeConfig, BrokerConfig, INTELLICONNECT_MODEL};
pub use error::CoreError;
pub use sensor::{Metric, SensorConfig, Telemetry};
