// ── Device gateway ──
//
// The seam between the engine and a router. `DeviceConnector` opens a
// `DeviceSession`; callers must `close()` the session on every exit path,
// so call sites follow a fixed shape:
//
//     let session = connector.connect(&router).await?;
//     let result = work(session.as_ref()).await;
//     session.close().await;
//     result

mod routeros;

use async_trait::async_trait;
use strum::{AsRefStr, Display};

use crate::error::CoreError;
use crate::model::{ActiveSession, DeviceSnapshot, InterfaceCounters, NewSubscriber, Router, Secret};

pub use routeros::RouterOsConnector;

/// Secret properties the engine writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SecretField {
    Profile,
    Comment,
}

/// Opens sessions to routers.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Fails with [`CoreError::DeviceUnreachable`] on network or auth errors.
    async fn connect(&self, router: &Router) -> Result<Box<dyn DeviceSession>, CoreError>;
}

/// One open session against one router.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Router identity observed during connect.
    fn identity(&self) -> &str;

    async fn list_secrets(&self) -> Result<Vec<Secret>, CoreError>;

    async fn find_secret(&self, name: &str) -> Result<Option<Secret>, CoreError>;

    async fn list_active_sessions(&self) -> Result<Vec<ActiveSession>, CoreError>;

    /// Live sessions of one secret, filtered on the device.
    async fn find_active_sessions(&self, name: &str) -> Result<Vec<ActiveSession>, CoreError>;

    async fn list_interfaces(&self) -> Result<Vec<InterfaceCounters>, CoreError>;

    async fn list_profiles(&self) -> Result<Vec<String>, CoreError>;

    /// Idempotent. Fails if no secret has this name.
    async fn set_secret_field(
        &self,
        name: &str,
        field: SecretField,
        value: &str,
    ) -> Result<(), CoreError>;

    /// Idempotent. Removing an already-ended session succeeds.
    async fn remove_active_session(&self, id: &str) -> Result<(), CoreError>;

    async fn add_secret(&self, secret: &NewSubscriber) -> Result<(), CoreError>;

    /// Always succeeds.
    async fn close(&self);
}

/// Read the three listings the reconciler needs, concurrently.
pub async fn fetch_snapshot(session: &dyn DeviceSession) -> Result<DeviceSnapshot, CoreError> {
    let (secrets, active, interfaces) = tokio::try_join!(
        session.list_secrets(),
        session.list_active_sessions(),
        session.list_interfaces(),
    )?;
    Ok(DeviceSnapshot {
        secrets,
        active,
        interfaces,
    })
}

/// Drop every live session belonging to `name`. Returns how many were removed.
pub async fn disconnect_subscriber(
    session: &dyn DeviceSession,
    name: &str,
) -> Result<usize, CoreError> {
    let active = session.find_active_sessions(name).await?;
    let mut removed = 0;
    // Re-check the name: older firmware ignores unknown query filters.
    for s in active.iter().filter(|s| s.name == name) {
        session.remove_active_session(&s.id).await?;
        removed += 1;
    }
    Ok(removed)
}
