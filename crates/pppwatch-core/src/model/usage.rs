// ── Usage read models ──

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::router::RouterId;
use super::subscriber::{Counters, SubscriberRecord};

/// One completed session's byte totals. Append-only; survives deletion
/// of the subscriber row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    pub router_id: RouterId,
    pub name: String,
    pub bytes: Counters,
    pub session_end: DateTime<Utc>,
}

/// Totals for a single subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub name: String,
    pub is_online: bool,
    pub current: Counters,
    pub accumulated: Counters,
    pub total: Counters,
    pub last_seen_online: Option<DateTime<Utc>>,
}

impl From<&SubscriberRecord> for UsageSummary {
    fn from(record: &SubscriberRecord) -> Self {
        Self {
            name: record.name.clone(),
            is_online: record.is_online,
            current: record.current,
            accumulated: record.accumulated,
            total: record.total(),
            last_seen_online: record.last_seen_online,
        }
    }
}

/// A subscriber's totals plus its most recent completed sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberUsage {
    #[serde(flatten)]
    pub summary: UsageSummary,
    pub recent_sessions: Vec<UsageRecord>,
}
