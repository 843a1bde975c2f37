use crate::client::CloudClient;
use crate::error::Error;
use crate::models::{Profile, ProfileEnvelope};

impl CloudClient {
    /// `GET user/user-service/common/profile`
    pub async fn get_profile(&self) -> Result<Profile, Error> {
        let url = self.api_url("user/user-service/common/profile")?;
        let envelope: ProfileEnvelope = self.get(url).await?;
        Ok(envelope.response)
    }
}
