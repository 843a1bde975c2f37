// ── Sensor mapping ──
//
// Pure translation from a device snapshot to the two MQTT documents the
// bridge publishes: the telemetry payload and one Home Assistant discovery
// config per metric. No I/O here.

use pentair_api::Device;
use serde::Serialize;

use crate::error::CoreError;

// ── Metric ───────────────────────────────────────────────────────────

/// A tracked pump/controller reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Power,
    Speed,
    Flow,
    Temperature,
    OutsideTemperature,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Power,
        Metric::Speed,
        Metric::Flow,
        Metric::Temperature,
        Metric::OutsideTemperature,
    ];

    /// Key in the device's `fields` map.
    pub fn field_key(self) -> &'static str {
        match self {
            Self::Power => "ifs3",
            Self::Speed => "ifs4",
            Self::Flow => "ifs6",
            Self::Temperature => "t0",
            Self::OutsideTemperature => "t1",
        }
    }

    /// Member name in the telemetry payload.
    pub fn json_key(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Speed => "actualspeed",
            Self::Flow => "actualflow",
            Self::Temperature => "actualtemp",
            Self::OutsideTemperature => "outsidetemp",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Power => "Pump Power",
            Self::Speed => "Pump Speed",
            Self::Flow => "Pump Flow",
            Self::Temperature => "Water Temperature",
            Self::OutsideTemperature => "Outside Temperature",
        }
    }

    /// Home Assistant `device_class`.
    pub fn device_class(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Speed => "speed",
            Self::Flow => "volume_flow_rate",
            Self::Temperature | Self::OutsideTemperature => "temperature",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Power => "W",
            Self::Speed => "rpm",
            Self::Flow => "gal/min",
            Self::Temperature | Self::OutsideTemperature => "°F",
        }
    }

    /// Not every controller has an air sensor; the others are mandatory.
    pub fn is_required(self) -> bool {
        !matches!(self, Self::OutsideTemperature)
    }

    /// Parse this metric's field as a decimal number.
    ///
    /// A missing field, an unparsable value and a non-finite value are all
    /// extraction errors. There is no fallback to zero.
    pub fn read(self, device: &Device) -> Result<f64, CoreError> {
        let field = device
            .field(self.field_key())
            .ok_or_else(|| self.extraction_error("field missing"))?;

        let value: f64 = field
            .value
            .trim()
            .parse()
            .map_err(|e| self.extraction_error(format!("{:?} is not a number: {e}", field.value)))?;

        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.extraction_error(format!("{value} is not a finite number")))
        }
    }

    /// Like [`read`](Self::read), but an absent optional field is `None`.
    fn read_optional(self, device: &Device) -> Result<Option<f64>, CoreError> {
        if !self.is_required() && device.field(self.field_key()).is_none() {
            return Ok(None);
        }
        self.read(device).map(Some)
    }

    fn extraction_error(self, reason: impl Into<String>) -> CoreError {
        CoreError::FieldExtraction {
            metric: self.json_key(),
            field: self.field_key(),
            reason: reason.into(),
        }
    }
}

// ── Telemetry ────────────────────────────────────────────────────────

/// State payload published to `<prefix>/<deviceId>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Telemetry {
    pub power: f64,
    #[serde(rename = "actualspeed")]
    pub actual_speed: f64,
    #[serde(rename = "actualflow")]
    pub actual_flow: f64,
    #[serde(rename = "actualtemp")]
    pub actual_temp: f64,
    #[serde(rename = "outsidetemp", skip_serializing_if = "Option::is_none")]
    pub outside_temp: Option<f64>,
}

impl Telemetry {
    pub fn from_device(device: &Device) -> Result<Self, CoreError> {
        Ok(Self {
            power: Metric::Power.read(device)?,
            actual_speed: Metric::Speed.read(device)?,
            actual_flow: Metric::Flow.read(device)?,
            actual_temp: Metric::Temperature.read(device)?,
            outside_temp: Metric::OutsideTemperature.read_optional(device)?,
        })
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(|e| CoreError::Internal(format!("encode telemetry: {e}")))
    }
}

// ── Discovery ────────────────────────────────────────────────────────

/// Device block shared by every sensor of one controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryDevice {
    pub name: String,
    pub identifiers: Vec<String>,
    pub manufacturer: String,
    pub sw_version: String,
}

/// Home Assistant MQTT sensor discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorConfig {
    pub name: String,
    pub state_topic: String,
    pub device_class: String,
    pub value_template: String,
    pub unique_id: String,
    pub unit_of_measurement: String,
    pub device: DiscoveryDevice,
}

impl SensorConfig {
    pub fn new(device: &Device, metric: Metric, state_prefix: &str) -> Self {
        let key = metric.json_key();
        let name = if device.product_info.nick_name.is_empty() {
            device.device_id.clone()
        } else {
            device.product_info.nick_name.clone()
        };

        Self {
            name: metric.display_name().to_owned(),
            state_topic: state_topic(state_prefix, &device.device_id),
            device_class: metric.device_class().to_owned(),
            value_template: format!("{{{{ value_json.{key} }}}}"),
            unique_id: unique_id(&device.device_id, key),
            unit_of_measurement: metric.unit().to_owned(),
            device: DiscoveryDevice {
                name,
                identifiers: vec![device.device_id.clone()],
                manufacturer: device.product_info.maker.clone(),
                sw_version: device.fw_version.clone(),
            },
        }
    }

    pub fn discovery_topic(&self, discovery_prefix: &str) -> String {
        format!("{discovery_prefix}/sensor/{}/config", self.unique_id)
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self)
            .map_err(|e| CoreError::Internal(format!("encode sensor config: {e}")))
    }
}

/// One discovery config per tracked metric.
pub fn discovery_configs(device: &Device, state_prefix: &str) -> Vec<SensorConfig> {
    Metric::ALL
        .iter()
        .map(|metric| SensorConfig::new(device, *metric, state_prefix))
        .collect()
}

pub fn state_topic(state_prefix: &str, device_id: &str) -> String {
    format!("{state_prefix}/{device_id}")
}

pub fn unique_id(device_id: &str, json_key: &str) -> String {
    format!("ph_{device_id}_{json_key}")
}
