// ── Isolation controller ──
//
// Flips a subscriber between its normal profile and the router's
// quarantine profile. The stored `original_profile` is the authoritative
// "isolated by us" marker; a device profile that already equals the
// quarantine profile is treated as quarantined too, so a subscriber
// isolated by hand on the router can still be restored.
//
// Ordering keeps the marker and the device consistent on partial failure:
//
//   isolate: persist marker -> set device profile -> disconnect
//            (device failure clears the marker again)
//   restore: set device profile -> clear marker -> disconnect
//            (a failed clear leaves the marker; retrying restores again,
//            which is idempotent)
//
// Disconnecting is best effort: the profile change already happened, and
// the subscriber picks it up on its next reconnect anyway.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use strum::Display;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::device::{DeviceConnector, DeviceSession, SecretField, disconnect_subscriber};
use crate::error::CoreError;
use crate::model::{Router, RouterId};
use crate::store::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IsolationAction {
    Isolated,
    Restored,
}

/// What a toggle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsolationOutcome {
    pub name: String,
    pub action: IsolationAction,
    /// Profile now set on the device.
    pub profile: String,
    /// Profile the subscriber had before the toggle.
    pub previous_profile: String,
    /// Live sessions dropped to force a reconnect.
    pub sessions_removed: usize,
}

type LockKey = (RouterId, String);

pub struct IsolationController {
    connector: Arc<dyn DeviceConnector>,
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    fallback_profile: String,
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl IsolationController {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        repo: Arc<dyn Repository>,
        clock: Arc<dyn Clock>,
        fallback_profile: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            repo,
            clock,
            fallback_profile: fallback_profile.into(),
            locks: DashMap::new(),
        }
    }

    /// Isolate a normal subscriber, or restore a quarantined one.
    ///
    /// `restore_to` overrides the restore target; it is ignored when
    /// isolating. Toggles of the same subscriber are serialized.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoQuarantineProfile`] when the router has no quarantine
    /// profile (checked before contacting the device),
    /// [`CoreError::SubscriberNotFound`] when the secret does not exist on
    /// the device, and device or storage errors otherwise.
    pub async fn toggle(
        &self,
        router: &Router,
        name: &str,
        restore_to: Option<&str>,
    ) -> Result<IsolationOutcome, CoreError> {
        let Some(quarantine) = router.quarantine_profile() else {
            return Err(CoreError::NoQuarantineProfile {
                router: router.name.clone(),
            });
        };

        let key = (router.id, name.to_owned());
        let lock = self.lock_for(&key);
        let result = {
            let _guard = lock.lock().await;
            self.toggle_locked(router, name, quarantine, restore_to)
                .await
        };
        drop(lock);
        // Nobody else holds or waits on it: drop the entry.
        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Drop the locks of a deleted router.
    pub fn forget_router(&self, router: RouterId) {
        self.locks.retain(|(id, _), lock| *id != router || Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    fn lock_for(&self, key: &LockKey) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    async fn toggle_locked(
        &self,
        router: &Router,
        name: &str,
        quarantine: &str,
        restore_to: Option<&str>,
    ) -> Result<IsolationOutcome, CoreError> {
        let session = self.connector.connect(router).await?;
        let result = self
            .toggle_with(session.as_ref(), router, name, quarantine, restore_to)
            .await;
        session.close().await;
        result
    }

    async fn toggle_with(
        &self,
        session: &dyn DeviceSession,
        router: &Router,
        name: &str,
        quarantine: &str,
        restore_to: Option<&str>,
    ) -> Result<IsolationOutcome, CoreError> {
        let secret =
            session
                .find_secret(name)
                .await?
                .ok_or_else(|| CoreError::SubscriberNotFound {
                    router: router.name.clone(),
                    name: name.to_owned(),
                })?;

        let marker = self
            .repo
            .get_subscriber(router.id, name)
            .await?
            .and_then(|row| row.original_profile);

        if marker.is_some() || secret.profile == quarantine {
            let target = restore_to
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .or(marker)
                .unwrap_or_else(|| self.fallback_profile.clone());
            self.restore(session, router.id, name, secret.profile, target)
                .await
        } else {
            self.isolate(session, router.id, name, secret.profile, quarantine)
                .await
        }
    }

    async fn isolate(
        &self,
        session: &dyn DeviceSession,
        router: RouterId,
        name: &str,
        current: String,
        quarantine: &str,
    ) -> Result<IsolationOutcome, CoreError> {
        let now = self.clock.now();
        self.repo
            .set_original_profile(router, name, Some(&current), now)
            .await?;

        if let Err(e) = session
            .set_secret_field(name, SecretField::Profile, quarantine)
            .await
        {
            if let Err(undo) = self
                .repo
                .set_original_profile(router, name, None, self.clock.now())
                .await
            {
                warn!(%router, subscriber = name, error = %undo, "could not clear isolation marker after device failure");
            }
            return Err(e);
        }

        let sessions_removed = kick(session, router, name).await;
        info!(%router, subscriber = name, from = %current, to = quarantine, "subscriber isolated");
        Ok(IsolationOutcome {
            name: name.to_owned(),
            action: IsolationAction::Isolated,
            profile: quarantine.to_owned(),
            previous_profile: current,
            sessions_removed,
        })
    }

    async fn restore(
        &self,
        session: &dyn DeviceSession,
        router: RouterId,
        name: &str,
        current: String,
        target: String,
    ) -> Result<IsolationOutcome, CoreError> {
        session
            .set_secret_field(name, SecretField::Profile, &target)
            .await?;
        self.repo
            .set_original_profile(router, name, None, self.clock.now())
            .await?;

        let sessions_removed = kick(session, router, name).await;
        info!(%router, subscriber = name, from = %current, to = %target, "subscriber restored");
        Ok(IsolationOutcome {
            name: name.to_owned(),
            action: IsolationAction::Restored,
            profile: target,
            previous_profile: current,
            sessions_removed,
        })
    }
}

async fn kick(session: &dyn DeviceSession, router: RouterId, name: &str) -> usize {
    match disconnect_subscriber(session, name).await {
        Ok(n) => n,
        Err(e) => {
            warn!(%router, subscriber = name, error = %e, "could not disconnect subscriber");
            0
        }
    }
}
