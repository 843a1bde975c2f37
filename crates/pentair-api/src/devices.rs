// Device endpoints
//
// Listing (to pick the monitored controller) and single-device snapshots.

use serde_json::json;
use tracing::debug;

use crate::client::CloudClient;
use crate::error::Error;
use crate::models::{Device, DeviceEnvelope, ListDevicesEnvelope, ListedDevice};

impl CloudClient {
    /// List every device on the account.
    ///
    /// `GET device2/device2-service/user/listdevices`
    pub async fn list_devices(&self) -> Result<Vec<ListedDevice>, Error> {
        let url = self.api_url("device2/device2-service/user/listdevices")?;
        let envelope: ListDevicesEnvelope = self.get(url).await?;
        debug!(
            count = envelope.response.len(),
            reported = ?envelope.all_devices_count,
            "listed devices"
        );
        Ok(envelope.response)
    }

    /// Fetch a fresh snapshot of one device.
    ///
    /// `POST device2/device2-service/user/device` with `{"deviceIds": [id]}`.
    /// An empty result set is [`Error::DeviceNotFound`].
    pub async fn get_device(&self, device_id: &str) -> Result<Device, Error> {
        let url = self.api_url("device2/device2-service/user/device")?;
        let body = json!({ "deviceIds": [device_id] });
        let envelope: DeviceEnvelope = self.post(url, &body).await?;

        envelope
            .response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::DeviceNotFound {
                device_id: device_id.to_owned(),
            })
    }
}
