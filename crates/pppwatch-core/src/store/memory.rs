// In-process repository.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::Repository;
use crate::error::CoreError;
use crate::model::{Counters, GeoPoint, Router, RouterId, SubscriberRecord, UsageRecord};
use crate::reconcile::ReconcileBatch;

#[derive(Default)]
struct State {
    routers: BTreeMap<RouterId, Router>,
    subscribers: HashMap<(RouterId, String), SubscriberRecord>,
    history: Vec<UsageRecord>,
}

/// Everything in a single `RwLock`; a batch is applied under one write
/// guard, which makes it atomic.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All usage history, oldest first.
    pub async fn history(&self) -> Vec<UsageRecord> {
        self.state.read().await.history.clone()
    }
}

fn key(router: RouterId, name: &str) -> (RouterId, String) {
    (router, name.to_owned())
}

fn max_counters(a: Counters, b: Counters) -> Counters {
    Counters::new(a.tx.max(b.tx), a.rx.max(b.rx))
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_routers(&self) -> Result<Vec<Router>, CoreError> {
        let state = self.state.read().await;
        let mut routers: Vec<Router> = state.routers.values().cloned().collect();
        routers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(routers)
    }

    async fn get_router(&self, id: RouterId) -> Result<Option<Router>, CoreError> {
        Ok(self.state.read().await.routers.get(&id).cloned())
    }

    async fn insert_router(&self, router: &Router) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        if state.routers.contains_key(&router.id) {
            return Err(CoreError::storage(format!("router {} already exists", router.id)));
        }
        state.routers.insert(router.id, router.clone());
        Ok(())
    }

    async fn update_router(&self, router: &Router) -> Result<bool, CoreError> {
        let mut state = self.state.write().await;
        match state.routers.get_mut(&router.id) {
            Some(existing) => {
                *existing = router.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_router(&self, id: RouterId) -> Result<bool, CoreError> {
        let mut state = self.state.write().await;
        let existed = state.routers.remove(&id).is_some();
        state.subscribers.retain(|(router, _), _| *router != id);
        Ok(existed)
    }

    async fn mark_synced(&self, id: RouterId, at: DateTime<Utc>) -> Result<(), CoreError> {
        if let Some(router) = self.state.write().await.routers.get_mut(&id) {
            router.last_sync = Some(at);
        }
        Ok(())
    }

    async fn load_subscribers(&self, router: RouterId) -> Result<Vec<SubscriberRecord>, CoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<SubscriberRecord> = state
            .subscribers
            .values()
            .filter(|r| r.router_id == router)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_subscriber(
        &self,
        router: RouterId,
        name: &str,
    ) -> Result<Option<SubscriberRecord>, CoreError> {
        Ok(self
            .state
            .read()
            .await
            .subscribers
            .get(&key(router, name))
            .cloned())
    }

    async fn apply_batch(
        &self,
        router: RouterId,
        batch: &ReconcileBatch,
    ) -> Result<(), CoreError> {
        let mut state = self.state.write().await;

        for name in &batch.deletions {
            state.subscribers.remove(&key(router, name));
        }

        for row in &batch.upserts {
            match state.subscribers.get_mut(&key(router, &row.name)) {
                Some(existing) => {
                    existing.profile.clone_from(&row.profile);
                    existing.comment.clone_from(&row.comment);
                    existing.accumulated = max_counters(existing.accumulated, row.accumulated);
                    existing.current = row.current;
                    existing.is_online = row.is_online;
                    existing.last_seen_online = row.last_seen_online;
                    existing.updated_at = row.updated_at;
                }
                None => {
                    let mut fresh = row.clone();
                    fresh.router_id = router;
                    fresh.original_profile = None;
                    fresh.location = None;
                    state.subscribers.insert(key(router, &row.name), fresh);
                }
            }
        }

        state.history.extend(batch.history.iter().cloned());
        Ok(())
    }

    async fn set_original_profile(
        &self,
        router: RouterId,
        name: &str,
        profile: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        if let Some(row) = state.subscribers.get_mut(&key(router, name)) {
            row.original_profile = profile.map(str::to_owned);
            row.updated_at = now;
            return Ok(());
        }
        if let Some(profile) = profile {
            let mut row = SubscriberRecord::new(router, name, now);
            row.original_profile = Some(profile.to_owned());
            state.subscribers.insert(key(router, name), row);
        }
        Ok(())
    }

    async fn set_comment(
        &self,
        router: RouterId,
        name: &str,
        comment: Option<&str>,
    ) -> Result<bool, CoreError> {
        let mut state = self.state.write().await;
        Ok(match state.subscribers.get_mut(&key(router, name)) {
            Some(row) => {
                row.comment = comment.map(str::to_owned);
                true
            }
            None => false,
        })
    }

    async fn set_location(
        &self,
        router: RouterId,
        name: &str,
        location: Option<GeoPoint>,
    ) -> Result<bool, CoreError> {
        let mut state = self.state.write().await;
        Ok(match state.subscribers.get_mut(&key(router, name)) {
            Some(row) => {
                row.location = location;
                true
            }
            None => false,
        })
    }

    async fn recent_usage(
        &self,
        router: RouterId,
        name: &str,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, CoreError> {
        let state = self.state.read().await;
        let mut records: Vec<UsageRecord> = state
            .history
            .iter()
            .rev()
            .filter(|h| h.router_id == router && h.name == name)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.session_end.cmp(&a.session_end));
        records.truncate(limit);
        Ok(records)
    }
}
