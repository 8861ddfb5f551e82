// RouterOS REST implementation of the device gateway.

use async_trait::async_trait;
use tracing::debug;

use pppwatch_api::transport::{TlsMode, TransportConfig};
use pppwatch_api::{NewPppSecret, RouterOsClient};

use super::{DeviceConnector, DeviceSession, SecretField};
use crate::config::{EngineConfig, TlsVerification};
use crate::error::CoreError;
use crate::model::{ActiveSession, InterfaceCounters, NewSubscriber, Router, Secret};

/// Connects to routers over their `/rest` API.
#[derive(Debug, Clone)]
pub struct RouterOsConnector {
    transport: TransportConfig,
}

impl RouterOsConnector {
    pub fn new(config: &EngineConfig) -> Self {
        let tls = match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        Self {
            transport: TransportConfig {
                tls,
                timeout: config.device_timeout,
                connect_timeout: config.connect_timeout,
            },
        }
    }
}

#[async_trait]
impl DeviceConnector for RouterOsConnector {
    async fn connect(&self, router: &Router) -> Result<Box<dyn DeviceSession>, CoreError> {
        let base_url = router.base_url()?;
        let timeout_secs = self.transport.timeout.as_secs();
        let client = RouterOsClient::new(
            base_url,
            router.username.clone(),
            router.password.clone(),
            &self.transport,
        )
        .map_err(|e| device_error(&router.host, timeout_secs, e))?;

        // Anything short of a valid identity answer means we never got a
        // usable session.
        let identity = client.probe().await.map_err(|e| {
            match device_error(&router.host, timeout_secs, e) {
                CoreError::DeviceProtocol { message } => CoreError::DeviceUnreachable {
                    host: router.host.clone(),
                    reason: message,
                },
                other => other,
            }
        })?;

        debug!(router = %router.id, identity = %identity.name, "session open");
        Ok(Box::new(RouterOsSession {
            client,
            identity: identity.name,
            host: router.host.clone(),
            timeout_secs,
        }))
    }
}

struct RouterOsSession {
    client: RouterOsClient,
    identity: String,
    host: String,
    timeout_secs: u64,
}

impl RouterOsSession {
    fn err(&self, e: pppwatch_api::Error) -> CoreError {
        device_error(&self.host, self.timeout_secs, e)
    }
}

/// Translate an API error, filling in the router host and timeout the
/// bare transport error does not know about.
fn device_error(host: &str, timeout_secs: u64, err: pppwatch_api::Error) -> CoreError {
    match CoreError::from(err) {
        CoreError::DeviceUnreachable { host: h, reason } if h.is_empty() => {
            CoreError::DeviceUnreachable {
                host: host.to_owned(),
                reason,
            }
        }
        CoreError::Timeout { .. } => CoreError::Timeout { timeout_secs },
        other => other,
    }
}

#[async_trait]
impl DeviceSession for RouterOsSession {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn list_secrets(&self) -> Result<Vec<Secret>, CoreError> {
        let raw = self.client.list_secrets().await.map_err(|e| self.err(e))?;
        Ok(raw.into_iter().map(Secret::from).collect())
    }

    async fn find_secret(&self, name: &str) -> Result<Option<Secret>, CoreError> {
        let raw = self
            .client
            .find_secrets(name)
            .await
            .map_err(|e| self.err(e))?;
        Ok(raw.into_iter().next().map(Secret::from))
    }

    async fn list_active_sessions(&self) -> Result<Vec<ActiveSession>, CoreError> {
        let raw = self.client.list_active().await.map_err(|e| self.err(e))?;
        Ok(raw.into_iter().map(ActiveSession::from).collect())
    }

    async fn find_active_sessions(&self, name: &str) -> Result<Vec<ActiveSession>, CoreError> {
        let raw = self
            .client
            .find_active(name)
            .await
            .map_err(|e| self.err(e))?;
        Ok(raw.into_iter().map(ActiveSession::from).collect())
    }

    async fn list_interfaces(&self) -> Result<Vec<InterfaceCounters>, CoreError> {
        let raw = self
            .client
            .list_interfaces()
            .await
            .map_err(|e| self.err(e))?;
        Ok(raw.into_iter().map(InterfaceCounters::from).collect())
    }

    async fn list_profiles(&self) -> Result<Vec<String>, CoreError> {
        let raw = self.client.list_profiles().await.map_err(|e| self.err(e))?;
        Ok(raw.into_iter().map(|p| p.name).collect())
    }

    async fn set_secret_field(
        &self,
        name: &str,
        field: SecretField,
        value: &str,
    ) -> Result<(), CoreError> {
        self.client
            .set_secret_field(name, field.as_ref(), value)
            .await
            .map_err(|e| self.err(e))
    }

    async fn remove_active_session(&self, id: &str) -> Result<(), CoreError> {
        self.client
            .remove_active(id)
            .await
            .map_err(|e| self.err(e))
    }

    async fn add_secret(&self, secret: &NewSubscriber) -> Result<(), CoreError> {
        self.client
            .add_secret(&NewPppSecret::from(secret))
            .await
            .map_err(|e| self.err(e))
    }

    async fn close(&self) {
        // Stateless over REST.
        debug!(router = %self.host, "session closed");
    }
}
