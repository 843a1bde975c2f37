// Pentair cloud response types
//
// The device service wraps payloads in a `response` member whose shape
// differs per endpoint. Fields use `#[serde(default)]` liberally: the API
// omits members freely depending on device type and firmware.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

// ── Envelopes ────────────────────────────────────────────────────────

/// `POST device2/device2-service/user/device`
#[derive(Debug, Deserialize)]
pub(crate) struct DeviceEnvelope {
    pub response: DeviceData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceData {
    #[serde(default)]
    pub data: Vec<Device>,
}

/// `GET device2/device2-service/user/listdevices`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListDevicesEnvelope {
    #[serde(default)]
    pub response: Vec<ListedDevice>,
    #[serde(default)]
    pub all_devices_count: Option<u32>,
}

/// `GET user/user-service/common/profile`
#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    pub response: Profile,
}

// ── Device ───────────────────────────────────────────────────────────

/// Descriptive metadata attached to both listed and fetched devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub nick_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub maker: String,
    #[serde(deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(deserialize_with = "null_as_default")]
    pub visible: bool,
    pub order: Option<i64>,
}

/// One telemetry entry. Values are always transmitted as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceField {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub value: String,
    pub min: Option<serde_json::Value>,
    pub max: Option<serde_json::Value>,
}

/// Full device snapshot.
///
/// `fields` holds the telemetry, keyed by the controller's short field
/// codes (`ifs3`, `t0`, ...). Everything not modelled lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fw_version: String,
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub product_info: ProductInfo,
    #[serde(default)]
    pub fields: HashMap<String, DeviceField>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Device {
    pub fn field(&self, key: &str) -> Option<&DeviceField> {
        self.fields.get(key)
    }
}

/// Summary entry from the device list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedDevice {
    pub device_id: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub product_info: ProductInfo,
}

impl ListedDevice {
    /// Whether the product model equals `model` exactly.
    pub fn is_model(&self, model: &str) -> bool {
        self.product_info.model == model
    }
}

/// The API sends `null` where a member has no value; treat it as absent.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Profile ──────────────────────────────────────────────────────────

/// Account profile status. Only useful as a cheap authenticated health check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn device_envelope_parses_fields_and_keeps_extras() {
        let raw = json!({
            "response": {
                "code": "0",
                "data": [{
                    "deviceId": "abc123",
                    "deviceType": "IF31",
                    "fwVersion": "1.7.0",
                    "pname": "Pool pump",
                    "productInfo": {
                        "nickName": "Backyard",
                        "maker": null,
                        "model": "IntelliConnect",
                        "poolId": null
                    },
                    "fields": {
                        "ifs3": { "name": "ifs3", "value": "123.45", "min": "0", "max": "3450" }
                    }
                }]
            }
        });

        let envelope: DeviceEnvelope = serde_json::from_value(raw).unwrap();
        let device = &envelope.response.data[0];

        assert_eq!(device.device_id, "abc123");
        assert_eq!(device.product_info.model, "IntelliConnect");
        assert_eq!(device.product_info.maker, "");
        assert_eq!(device.field("ifs3").unwrap().value, "123.45");
        assert!(device.field("t0").is_none());
        assert_eq!(device.extra.get("pname"), Some(&json!("Pool pump")));
    }

    #[test]
    fn listed_device_matches_exact_model() {
        let listed: ListedDevice = serde_json::from_value(json!({
            "deviceId": "d1",
            "productInfo": { "model": "IntelliConnect" }
        }))
        .unwrap();

        assert!(listed.is_model("IntelliConnect"));
        assert!(!listed.is_model("intelliconnect"));
    }
}
