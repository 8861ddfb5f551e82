// ── Monitor ──
//
// Owns the engine: storage, device connector, notifier, clock, serving
// cache and the background sync task. Cheaply cloneable; all clones share
// state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::cache::ServingCache;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::device::{DeviceConnector, DeviceSession, SecretField, fetch_snapshot};
use crate::error::CoreError;
use crate::isolation::{IsolationController, IsolationOutcome};
use crate::model::{
    GeoPoint, NewRouter, NewSubscriber, Router, RouterId, RouterUpdate, SubscriberStatus,
    SubscriberUsage, UsageSummary,
};
use crate::notify::{Notifier, NullNotifier, SyncReport};
use crate::reconcile::{Reconciliation, reconcile};
use crate::scheduler::{CycleGate, SyncScheduler};
use crate::store::Repository;

const DELIVERY_GRACE: Duration = Duration::from_secs(10);

/// Result of syncing one router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub router_id: RouterId,
    /// Identity the router reported during this sync.
    pub identity: String,
    pub subscribers: usize,
    pub online: usize,
    pub logins: Vec<String>,
    pub logouts: Vec<String>,
    pub deleted: Vec<String>,
}

/// Result of one pass over every active router.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub routers: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Result of a connection test. Device failures are reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionProbe {
    pub connected: bool,
    pub identity: Option<String>,
    pub error: Option<String>,
}

// ── Builder ─────────────────────────────────────────────────────────

pub struct MonitorBuilder {
    config: EngineConfig,
    repo: Arc<dyn Repository>,
    connector: Arc<dyn DeviceConnector>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl MonitorBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Monitor {
        let cache = ServingCache::new(self.config.cache_ttl, Arc::clone(&self.clock));
        let gate = Arc::new(CycleGate::new(
            self.config.stuck_cycle_ceiling,
            Arc::clone(&self.clock),
        ));
        let isolation = IsolationController::new(
            Arc::clone(&self.connector),
            Arc::clone(&self.repo),
            Arc::clone(&self.clock),
            self.config.fallback_profile.clone(),
        );

        Monitor {
            inner: Arc::new(Inner {
                config: self.config,
                repo: self.repo,
                connector: self.connector,
                notifier: self.notifier,
                clock: self.clock,
                cache,
                gate,
                isolation,
                router_locks: DashMap::new(),
                cancel: CancellationToken::new(),
                scheduler: Mutex::new(None),
                deliveries: TaskTracker::new(),
            }),
        }
    }
}

// ── Monitor ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

struct Inner {
    config: EngineConfig,
    repo: Arc<dyn Repository>,
    connector: Arc<dyn DeviceConnector>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    cache: ServingCache,
    gate: Arc<CycleGate>,
    isolation: IsolationController,
    /// Serializes syncs of the same router (scheduler vs. `sync_now`).
    router_locks: DashMap<RouterId, Arc<Mutex<()>>>,
    cancel: CancellationToken,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    /// In-flight report deliveries, drained on shutdown.
    deliveries: TaskTracker,
}

impl Monitor {
    /// Start building a monitor. Defaults: [`EngineConfig::default`], the
    /// system clock, and no notifications.
    pub fn builder(
        repo: Arc<dyn Repository>,
        connector: Arc<dyn DeviceConnector>,
    ) -> MonitorBuilder {
        MonitorBuilder {
            config: EngineConfig::default(),
            repo,
            connector,
            notifier: Arc::new(NullNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &ServingCache {
        &self.inner.cache
    }

    pub fn cycle_in_progress(&self) -> bool {
        self.inner.gate.in_progress()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the background sync task. Calling it twice is a no-op.
    pub async fn start(&self) {
        let mut slot = self.inner.scheduler.lock().await;
        if slot.is_some() {
            return;
        }

        let scheduler = SyncScheduler::new(
            Arc::clone(&self.inner.gate),
            self.inner.config.sync_interval,
            self.inner.config.cycle_deadline,
        );
        let monitor = self.clone();
        let handle = scheduler.spawn(self.inner.cancel.clone(), move || {
            let monitor = monitor.clone();
            async move {
                monitor.run_cycle().await;
            }
        });
        *slot = Some(handle);
        info!(
            interval_secs = self.inner.config.sync_interval.as_secs(),
            "monitor started"
        );
    }

    /// Stop the sync task and wait for it to exit, then give pending
    /// reports a short grace period. A running cycle is cancelled.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.scheduler.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "sync task ended abnormally");
            }
        }

        self.inner.deliveries.close();
        if tokio::time::timeout(DELIVERY_GRACE, self.inner.deliveries.wait())
            .await
            .is_err()
        {
            warn!(
                pending = self.inner.deliveries.len(),
                "dropping undelivered sync reports"
            );
        }
        debug!("monitor stopped");
    }

    // ── Sync ─────────────────────────────────────────────────────────

    /// Sync every active router, one after another. A failing router is
    /// logged and skipped.
    pub async fn run_cycle(&self) -> CycleSummary {
        let started = Instant::now();
        let routers = match self.inner.repo.list_routers().await {
            Ok(routers) => routers,
            Err(e) => {
                warn!(error = %e, "could not load routers; skipping cycle");
                return CycleSummary::default();
            }
        };

        let mut summary = CycleSummary::default();
        for router in routers.iter().filter(|r| r.active) {
            summary.routers += 1;
            match self.sync_router(router).await {
                Ok(outcome) => {
                    summary.synced += 1;
                    debug!(
                        router = %router.id,
                        subscribers = outcome.subscribers,
                        online = outcome.online,
                        "router synced"
                    );
                }
                Err(e) if e.is_device_error() => {
                    summary.failed += 1;
                    warn!(router = %router.id, name = %router.name, error = %e, "router sync failed");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(router = %router.id, name = %router.name, error = %e, "router sync failed");
                }
            }
        }

        debug!(
            routers = summary.routers,
            failed = summary.failed,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "sync cycle finished"
        );
        summary
    }

    /// Poll one router, persist the reconciled rows, refresh its cache
    /// entry and send its report.
    pub async fn sync_router(&self, router: &Router) -> Result<SyncOutcome, CoreError> {
        let lock = self.router_lock(router.id);
        let _guard = lock.lock().await;
        // Taken before the device read: a mutation that invalidates the
        // router while we poll makes our list stale, and `put` refuses it.
        let ticket = self.inner.cache.ticket(router.id);

        let session = self.inner.connector.connect(router).await?;
        let polled = self.poll(session.as_ref(), router).await;
        if let Ok(cycle) = &polled {
            remove_orphans(session.as_ref(), router.id, cycle).await;
        }
        let identity = session.identity().to_owned();
        session.close().await;
        let cycle = polled?;

        self.inner.repo.apply_batch(router.id, &cycle.batch).await?;
        if !self.inner.cache.put(ticket, cycle.statuses.clone()) {
            debug!(router = %router.id, "router changed during sync; cache left empty");
        }

        // The batch is committed, so its logins and logouts are final:
        // report them even if the bookkeeping below fails.
        let now = self.inner.clock.now();
        self.notify(router, &cycle, now);
        if let Err(e) = self.inner.repo.mark_synced(router.id, now).await {
            warn!(router = %router.id, error = %e, "could not record last sync");
        }

        Ok(SyncOutcome {
            router_id: router.id,
            identity,
            subscribers: cycle.statuses.len(),
            online: cycle.online_count(),
            logins: cycle.logins,
            logouts: cycle.logouts,
            deleted: cycle.batch.deletions,
        })
    }

    /// Sync one router right away, adopting its identity as display name.
    pub async fn sync_now(&self, router_id: RouterId) -> Result<SyncOutcome, CoreError> {
        let mut router = self.router(router_id).await?;
        let outcome = self.sync_router(&router).await?;

        let identity = outcome.identity.trim();
        if !identity.is_empty() && identity != router.name {
            info!(router = %router.id, from = %router.name, to = identity, "router renamed from identity");
            identity.clone_into(&mut router.name);
            router.last_sync = Some(self.inner.clock.now());
            self.inner.repo.update_router(&router).await?;
        }
        Ok(outcome)
    }

    async fn poll(
        &self,
        session: &dyn DeviceSession,
        router: &Router,
    ) -> Result<Reconciliation, CoreError> {
        let snapshot = fetch_snapshot(session).await?;
        let prior = self.inner.repo.load_subscribers(router.id).await?;
        Ok(reconcile(
            router.id,
            &snapshot,
            &prior,
            self.inner.clock.now(),
        ))
    }

    fn notify(&self, router: &Router, cycle: &Reconciliation, at: DateTime<Utc>) {
        let Some(target) = router.telegram.clone() else {
            return;
        };
        let Some(text) = SyncReport::from_cycle(&router.name, at, cycle).render() else {
            return;
        };

        let notifier = Arc::clone(&self.inner.notifier);
        let router_id = router.id;
        self.inner.deliveries.spawn(async move {
            match notifier.send(&target, &text).await {
                Ok(()) => debug!(router = %router_id, "sync report sent"),
                Err(e) => warn!(router = %router_id, error = %e, "could not send sync report"),
            }
        });
    }

    fn router_lock(&self, id: RouterId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.inner
                .router_locks
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    // ── Subscribers ──────────────────────────────────────────────────

    /// Subscribers of a router from the serving cache, or from a bounded
    /// live fetch on a miss. Device trouble yields an empty list.
    pub async fn list_subscribers(
        &self,
        router_id: RouterId,
    ) -> Result<Vec<SubscriberStatus>, CoreError> {
        let router = self.router(router_id).await?;
        if let Some(hit) = self.inner.cache.get(router_id) {
            return Ok(hit.as_ref().clone());
        }

        // Run detached so a fetch that outlives the timeout still closes
        // its session.
        let monitor = self.clone();
        let fetch = tokio::spawn(async move { monitor.live_statuses(&router).await });

        match tokio::time::timeout(self.inner.config.live_fetch_timeout, fetch).await {
            Ok(Ok(Ok(statuses))) => Ok(statuses),
            Ok(Ok(Err(e))) => {
                warn!(router = %router_id, error = %e, "live fetch failed");
                Ok(Vec::new())
            }
            Ok(Err(e)) => {
                warn!(router = %router_id, error = %e, "live fetch task failed");
                Ok(Vec::new())
            }
            Err(_) => {
                warn!(
                    router = %router_id,
                    timeout_ms = u64::try_from(self.inner.config.live_fetch_timeout.as_millis()).unwrap_or(u64::MAX),
                    "live fetch timed out"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Reconciled view straight from the device. Read only: nothing is
    /// persisted or cached.
    async fn live_statuses(&self, router: &Router) -> Result<Vec<SubscriberStatus>, CoreError> {
        let session = self.inner.connector.connect(router).await?;
        let polled = self.poll(session.as_ref(), router).await;
        session.close().await;
        Ok(polled?.statuses)
    }

    /// Set a subscriber's comment on the device and locally. A blank
    /// comment clears it.
    pub async fn set_comment(
        &self,
        router_id: RouterId,
        name: &str,
        comment: &str,
    ) -> Result<(), CoreError> {
        let router = self.router(router_id).await?;
        let comment = comment.trim();

        let session = self.inner.connector.connect(&router).await?;
        let result = set_comment_on(session.as_ref(), &router, name, comment).await;
        session.close().await;
        result?;

        let stored = (!comment.is_empty()).then_some(comment);
        self.inner.repo.set_comment(router_id, name, stored).await?;
        self.inner.cache.invalidate(router_id);
        Ok(())
    }

    /// Store or clear a subscriber's coordinates. Local state only.
    pub async fn set_location(
        &self,
        router_id: RouterId,
        name: &str,
        location: Option<GeoPoint>,
    ) -> Result<(), CoreError> {
        self.router(router_id).await?;
        if !self.inner.repo.set_location(router_id, name, location).await? {
            return Err(CoreError::SubscriberNotFound {
                router: router_id.to_string(),
                name: name.to_owned(),
            });
        }
        self.inner.cache.invalidate(router_id);
        Ok(())
    }

    /// Isolate or restore a subscriber; see [`IsolationController::toggle`].
    pub async fn toggle_isolation(
        &self,
        router_id: RouterId,
        name: &str,
        restore_to: Option<&str>,
    ) -> Result<IsolationOutcome, CoreError> {
        let router = self.router(router_id).await?;
        let result = self.inner.isolation.toggle(&router, name, restore_to).await;
        // Invalidate on failure too: a partial toggle may have changed the device.
        self.inner.cache.invalidate(router_id);
        result
    }

    /// Create a PPP secret on the router, then sync so it shows up.
    pub async fn create_subscriber(
        &self,
        router_id: RouterId,
        subscriber: &NewSubscriber,
    ) -> Result<(), CoreError> {
        subscriber.validate()?;
        let router = self.router(router_id).await?;

        let session = self.inner.connector.connect(&router).await?;
        let result = session.add_secret(subscriber).await;
        session.close().await;
        result?;

        info!(router = %router_id, subscriber = %subscriber.name, "subscriber created");
        self.inner.cache.invalidate(router_id);
        if let Err(e) = self.sync_router(&router).await {
            warn!(router = %router_id, error = %e, "sync after create failed");
        }
        Ok(())
    }

    // ── Usage ────────────────────────────────────────────────────────

    pub async fn usage_summary(
        &self,
        router_id: RouterId,
        name: &str,
    ) -> Result<UsageSummary, CoreError> {
        self.router(router_id).await?;
        let record = self
            .inner
            .repo
            .get_subscriber(router_id, name)
            .await?
            .ok_or_else(|| CoreError::SubscriberNotFound {
                router: router_id.to_string(),
                name: name.to_owned(),
            })?;
        Ok(UsageSummary::from(&record))
    }

    /// Every stored subscriber with totals and its most recent sessions.
    pub async fn router_usage(&self, router_id: RouterId) -> Result<Vec<SubscriberUsage>, CoreError> {
        self.router(router_id).await?;
        let records = self.inner.repo.load_subscribers(router_id).await?;

        let mut usage = Vec::with_capacity(records.len());
        for record in &records {
            let recent_sessions = self
                .inner
                .repo
                .recent_usage(router_id, &record.name, self.inner.config.recent_sessions)
                .await?;
            usage.push(SubscriberUsage {
                summary: UsageSummary::from(record),
                recent_sessions,
            });
        }
        Ok(usage)
    }

    // ── Routers ──────────────────────────────────────────────────────

    pub async fn list_routers(&self) -> Result<Vec<Router>, CoreError> {
        self.inner.repo.list_routers().await
    }

    pub async fn router(&self, id: RouterId) -> Result<Router, CoreError> {
        self.inner
            .repo
            .get_router(id)
            .await?
            .ok_or_else(|| CoreError::RouterNotFound { id: id.to_string() })
    }

    pub async fn add_router(&self, new: NewRouter) -> Result<Router, CoreError> {
        let router = new.into_router(self.inner.clock.now())?;
        self.inner.repo.insert_router(&router).await?;
        info!(router = %router.id, name = %router.name, host = %router.host, "router added");
        Ok(router)
    }

    pub async fn update_router(
        &self,
        id: RouterId,
        update: RouterUpdate,
    ) -> Result<Router, CoreError> {
        let mut router = self.router(id).await?;
        update.apply(&mut router)?;
        if !self.inner.repo.update_router(&router).await? {
            return Err(CoreError::RouterNotFound { id: id.to_string() });
        }
        self.inner.cache.invalidate(id);
        Ok(router)
    }

    pub async fn remove_router(&self, id: RouterId) -> Result<(), CoreError> {
        if !self.inner.repo.delete_router(id).await? {
            return Err(CoreError::RouterNotFound { id: id.to_string() });
        }
        self.inner.cache.invalidate(id);
        self.inner.router_locks.remove(&id);
        self.inner.isolation.forget_router(id);
        info!(router = %id, "router removed");
        Ok(())
    }

    /// Try to open a session. Never fails on device errors.
    pub async fn test_connection(&self, id: RouterId) -> Result<ConnectionProbe, CoreError> {
        let router = self.router(id).await?;
        match self.inner.connector.connect(&router).await {
            Ok(session) => {
                let identity = session.identity().to_owned();
                session.close().await;
                Ok(ConnectionProbe {
                    connected: true,
                    identity: Some(identity),
                    error: None,
                })
            }
            Err(e) => {
                debug!(router = %id, error = %e, "connection test failed");
                Ok(ConnectionProbe {
                    connected: false,
                    identity: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// PPP profile names on the router; empty on device errors.
    pub async fn list_profiles(&self, id: RouterId) -> Result<Vec<String>, CoreError> {
        let router = self.router(id).await?;
        let session = match self.inner.connector.connect(&router).await {
            Ok(session) => session,
            Err(e) => {
                warn!(router = %id, error = %e, "could not list profiles");
                return Ok(Vec::new());
            }
        };
        let result = session.list_profiles().await;
        session.close().await;

        Ok(result.unwrap_or_else(|e| {
            warn!(router = %id, error = %e, "could not list profiles");
            Vec::new()
        }))
    }
}

async fn set_comment_on(
    session: &dyn DeviceSession,
    router: &Router,
    name: &str,
    comment: &str,
) -> Result<(), CoreError> {
    if session.find_secret(name).await?.is_none() {
        return Err(CoreError::SubscriberNotFound {
            router: router.name.clone(),
            name: name.to_owned(),
        });
    }
    session
        .set_secret_field(name, SecretField::Comment, comment)
        .await
}

async fn remove_orphans(session: &dyn DeviceSession, router: RouterId, cycle: &Reconciliation) {
    for orphan in &cycle.orphan_sessions {
        match session.remove_active_session(&orphan.id).await {
            Ok(()) => debug!(%router, subscriber = %orphan.name, "orphan session removed"),
            Err(e) => {
                warn!(%router, subscriber = %orphan.name, error = %e, "could not remove orphan session");
            }
        }
    }
}
