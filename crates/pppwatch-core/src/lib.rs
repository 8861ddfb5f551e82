//! Usage reconciliation and device control for MikroTik PPP subscribers.
//!
//! This crate owns the engine between `pppwatch-api` and the operator
//! binary:
//!
//! - **[`Monitor`]**: Facade over everything below. [`start()`](Monitor::start)
//!   spawns the background sync; the remaining methods are the operations
//!   a front end calls (list subscribers, comment, isolate, create, sync now,
//!   router registry, usage reads).
//!
//! - **Reconciler** ([`reconcile()`]): Pure function from one router's
//!   device snapshot plus its stored rows to updated counters and
//!   login/logout events. Accumulated totals survive counter resets and
//!   never decrease.
//!
//! - **[`ServingCache`]**: Per-router subscriber list with a 45s freshness
//!   window, so reads do not hit the router.
//!
//! - **[`SyncScheduler`]**: Fixed-interval, one-at-a-time cycle runner with
//!   a per-cycle deadline and a stuck-cycle ceiling.
//!
//! - **[`IsolationController`]**: Quarantine/restore state machine that
//!   keeps the device profile and the stored restore target consistent.
//!
//! - **Notifications** ([`notify`]): One report per router per cycle,
//!   delivered through a [`Notifier`](notify::Notifier) (Telegram shipped).
//!
//! - **Persistence** ([`store`]): [`Repository`] contract with in-memory
//!   and SQLite implementations.

pub mod cache;
pub mod clock;
pub mod config;
pub mod convert;
pub mod device;
pub mod error;
pub mod isolation;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod reconcile;
pub mod scheduler;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::ServingCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, TlsVerification};
pub use device::{DeviceConnector, DeviceSession, RouterOsConnector, SecretField};
pub use error::CoreError;
pub use isolation::{IsolationAction, IsolationController, IsolationOutcome};
pub use monitor::{ConnectionProbe, CycleSummary, Monitor, MonitorBuilder, SyncOutcome};
pub use notify::{Notifier, NullNotifier, SyncReport, TelegramNotifier};
pub use reconcile::{ReconcileBatch, Reconciliation, reconcile};
pub use scheduler::{CycleGate, Gate, SyncScheduler};
pub use store::{MemoryRepository, Repository, SqliteRepository};

pub use model::{
    ActiveSession, Counters, DeviceSnapshot, GeoPoint, InterfaceCounters, NewRouter,
    NewSubscriber, Router, RouterId, RouterUpdate, Secret, SubscriberRecord, SubscriberStatus,
    SubscriberUsage, TelegramTarget, UsageRecord, UsageSummary,
};
