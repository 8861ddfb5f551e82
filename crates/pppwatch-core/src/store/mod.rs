// ── Persistence ──
//
// The engine's durable state: routers, one subscriber row per
// (router, secret name), and append-only usage history.
//
// Column ownership matters because the sync cycle and the operator
// commands write the same rows concurrently. A cycle's upsert owns the
// device-derived fields and counters; it never touches `original_profile`
// or `location`, which belong to the isolation and locate commands.

mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{GeoPoint, Router, RouterId, SubscriberRecord, UsageRecord};
use crate::reconcile::ReconcileBatch;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

#[async_trait]
pub trait Repository: Send + Sync {
    // ── Routers ──────────────────────────────────────────────────────

    async fn list_routers(&self) -> Result<Vec<Router>, CoreError>;

    async fn get_router(&self, id: RouterId) -> Result<Option<Router>, CoreError>;

    async fn insert_router(&self, router: &Router) -> Result<(), CoreError>;

    /// Returns `false` if the router does not exist.
    async fn update_router(&self, router: &Router) -> Result<bool, CoreError>;

    /// Removes the router and its subscriber rows. Usage history stays.
    async fn delete_router(&self, id: RouterId) -> Result<bool, CoreError>;

    async fn mark_synced(&self, id: RouterId, at: DateTime<Utc>) -> Result<(), CoreError>;

    // ── Subscribers ──────────────────────────────────────────────────

    async fn load_subscribers(&self, router: RouterId) -> Result<Vec<SubscriberRecord>, CoreError>;

    async fn get_subscriber(
        &self,
        router: RouterId,
        name: &str,
    ) -> Result<Option<SubscriberRecord>, CoreError>;

    /// Apply one router cycle's deletions, upserts and history appends
    /// atomically. Stored accumulated counters are never lowered.
    async fn apply_batch(&self, router: RouterId, batch: &ReconcileBatch)
    -> Result<(), CoreError>;

    /// Set or clear the isolation marker. Setting it creates the row if
    /// the subscriber has not been synced yet.
    async fn set_original_profile(
        &self,
        router: RouterId,
        name: &str,
        profile: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Returns `false` if there is no row for the subscriber.
    async fn set_comment(
        &self,
        router: RouterId,
        name: &str,
        comment: Option<&str>,
    ) -> Result<bool, CoreError>;

    /// Returns `false` if there is no row for the subscriber.
    async fn set_location(
        &self,
        router: RouterId,
        name: &str,
        location: Option<GeoPoint>,
    ) -> Result<bool, CoreError>;

    // ── Usage history ────────────────────────────────────────────────

    /// Most recent completed sessions first.
    async fn recent_usage(
        &self,
        router: RouterId,
        name: &str,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, CoreError>;
}
