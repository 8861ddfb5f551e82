// ── Domain model ──

pub mod router;
pub mod snapshot;
pub mod subscriber;
pub mod usage;

pub use router::{NewRouter, Router, RouterId, RouterUpdate, TelegramTarget, telegram_target};
pub use snapshot::{ActiveSession, DeviceSnapshot, InterfaceCounters, Secret};
pub use subscriber::{
    Counters, GeoPoint, NewSubscriber, SubscriberRecord, SubscriberStatus,
};
pub use usage::{SubscriberUsage, UsageRecord, UsageSummary};
