// System endpoints
//
// The identity probe doubles as the connect handshake: it is the cheapest
// authenticated request RouterOS offers.

use tracing::debug;

use crate::error::Error;
use crate::routeros::client::RouterOsClient;
use crate::routeros::models::SystemIdentity;

impl RouterOsClient {
    /// Fetch the router's configured identity.
    ///
    /// `GET /rest/system/identity`
    pub async fn identity(&self) -> Result<SystemIdentity, Error> {
        let url = self.rest_url("system/identity")?;
        self.get(url).await
    }

    /// Verify reachability and credentials.
    ///
    /// Returns the router identity on success; an [`Error::Authentication`]
    /// if the credentials are rejected.
    pub async fn probe(&self) -> Result<SystemIdentity, Error> {
        debug!(router = %self.base_url(), "probing router");
        let identity = self.identity().await?;
        debug!(identity = %identity.name, "router reachable");
        Ok(identity)
    }
}
