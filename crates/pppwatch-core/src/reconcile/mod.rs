// ── Counter reconciliation ──
//
// Pure: one router's fresh snapshot plus its stored rows in, updated rows
// and login/logout events out. Nothing here touches the network, storage
// or the clock.
//
// Accumulation happens only when a session's counters go away: on a
// counter reset while online, or when the subscriber drops offline. A
// steadily increasing online counter is never folded, so polling it any
// number of times leaves `accumulated` unchanged.

pub mod ifname;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::model::{
    ActiveSession, Counters, DeviceSnapshot, InterfaceCounters, RouterId, SubscriberRecord,
    SubscriberStatus, UsageRecord,
};

/// Storage writes for one router cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileBatch {
    /// Rows to insert or update, keyed by `(router_id, name)`.
    pub upserts: Vec<SubscriberRecord>,
    /// Names no longer configured on the router.
    pub deletions: Vec<String>,
    /// Completed sessions to append.
    pub history: Vec<UsageRecord>,
}

impl ReconcileBatch {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty() && self.history.is_empty()
    }
}

/// Result of reconciling one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Every configured subscriber, sorted by name.
    pub statuses: Vec<SubscriberStatus>,
    pub batch: ReconcileBatch,
    /// Sorted names that came online this cycle.
    pub logins: Vec<String>,
    /// Sorted names that went offline (or vanished while online) this cycle.
    pub logouts: Vec<String>,
    /// Live sessions whose secret no longer exists.
    pub orphan_sessions: Vec<ActiveSession>,
}

impl Reconciliation {
    pub fn online_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_online).count()
    }

    /// Sorted names of configured subscribers that are not connected.
    pub fn offline_names(&self) -> Vec<String> {
        self.statuses
            .iter()
            .filter(|s| !s.is_online)
            .map(|s| s.name.clone())
            .collect()
    }
}

/// Counter state after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    accumulated: Counters,
    current: Counters,
    /// Totals of a session that ended this step.
    ended_session: Option<Counters>,
}

/// Advance one subscriber's counters.
///
/// `live` is `None` when the subscriber is offline, or online without a
/// matching tunnel interface (e.g. the interface is not up yet). The latter
/// keeps the stored session counters rather than treating the gap as a
/// reset.
fn advance(prev: Option<&SubscriberRecord>, online: bool, live: Option<Counters>) -> Step {
    let Some(prev) = prev else {
        return Step {
            accumulated: Counters::ZERO,
            current: if online { live.unwrap_or_default() } else { Counters::ZERO },
            ended_session: None,
        };
    };

    if !online {
        // Fold whatever session was last observed, once; `current` is
        // zeroed so the next offline cycle has nothing left to fold.
        if prev.current.is_zero() {
            return Step {
                accumulated: prev.accumulated,
                current: Counters::ZERO,
                ended_session: None,
            };
        }
        return Step {
            accumulated: prev.accumulated + prev.current,
            current: Counters::ZERO,
            ended_session: Some(prev.current),
        };
    }

    let Some(live) = live else {
        return Step {
            accumulated: prev.accumulated,
            current: prev.current,
            ended_session: None,
        };
    };

    // A counter that went backwards was reset by a reconnect or reboot; the
    // previous value is the finished run and moves into `accumulated`.
    let mut accumulated = prev.accumulated;
    if live.tx < prev.current.tx {
        accumulated.tx = accumulated.tx.saturating_add(prev.current.tx);
    }
    if live.rx < prev.current.rx {
        accumulated.rx = accumulated.rx.saturating_add(prev.current.rx);
    }

    Step {
        accumulated,
        current: live,
        ended_session: None,
    }
}

/// Reconcile one router's snapshot against its stored rows.
pub fn reconcile(
    router_id: RouterId,
    snapshot: &DeviceSnapshot,
    prior: &[SubscriberRecord],
    now: DateTime<Utc>,
) -> Reconciliation {
    let prior_by_name: HashMap<&str, &SubscriberRecord> =
        prior.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut sessions: HashMap<&str, &ActiveSession> = HashMap::new();
    for session in &snapshot.active {
        sessions.entry(session.name.as_str()).or_insert(session);
    }

    let mut tunnels: HashMap<&str, &InterfaceCounters> = HashMap::new();
    for iface in &snapshot.interfaces {
        if let Some(name) = ifname::secret_name(&iface.name) {
            tunnels.entry(name).or_insert(iface);
        }
    }

    let mut out = Reconciliation::default();
    let mut configured: HashSet<&str> = HashSet::with_capacity(snapshot.secrets.len());

    for secret in &snapshot.secrets {
        let name = secret.name.as_str();
        if !configured.insert(name) {
            continue;
        }

        let prev = prior_by_name.get(name).copied();
        let session = sessions.get(name).copied();
        let online = session.is_some();
        let tunnel = if online { tunnels.get(name).copied() } else { None };

        let step = advance(prev, online, tunnel.map(|t| t.bytes));
        let was_online = prev.is_some_and(|p| p.is_online);

        if online && !was_online {
            out.logins.push(secret.name.clone());
        }
        if was_online && !online {
            out.logouts.push(secret.name.clone());
        }
        if let Some(bytes) = step.ended_session {
            out.batch.history.push(UsageRecord {
                router_id,
                name: secret.name.clone(),
                bytes,
                session_end: now,
            });
        }

        let original_profile = prev.and_then(|p| p.original_profile.clone());
        let location = prev.and_then(|p| p.location);

        out.statuses.push(SubscriberStatus {
            name: secret.name.clone(),
            service: session.map_or_else(|| secret.service.clone(), |s| s.service.clone()),
            profile: secret.profile.clone(),
            disabled: secret.disabled,
            comment: secret.comment.clone(),
            is_online: online,
            address: session.and_then(|s| s.address.clone()),
            uptime: session.and_then(|s| s.uptime.clone()),
            caller_id: session.and_then(|s| s.caller_id.clone()),
            current: step.current,
            rate: tunnel.map(|t| t.rate).unwrap_or_default(),
            accumulated: step.accumulated,
            total: step.accumulated + step.current,
            original_profile: original_profile.clone(),
            location,
        });

        out.batch.upserts.push(SubscriberRecord {
            router_id,
            name: secret.name.clone(),
            profile: Some(secret.profile.clone()),
            comment: secret.comment.clone(),
            location,
            original_profile,
            accumulated: step.accumulated,
            current: step.current,
            is_online: online,
            last_seen_online: if online {
                Some(now)
            } else {
                prev.and_then(|p| p.last_seen_online)
            },
            updated_at: now,
        });
    }

    // Stored rows whose secret is gone from the router.
    for record in prior {
        if configured.contains(record.name.as_str()) {
            continue;
        }
        out.batch.deletions.push(record.name.clone());
        if record.is_online {
            out.logouts.push(record.name.clone());
        }
        if !record.current.is_zero() {
            out.batch.history.push(UsageRecord {
                router_id,
                name: record.name.clone(),
                bytes: record.current,
                session_end: now,
            });
        }
    }

    let deleted: HashSet<&str> = out.batch.deletions.iter().map(String::as_str).collect();
    out.orphan_sessions = snapshot
        .active
        .iter()
        .filter(|s| deleted.contains(s.name.as_str()))
        .cloned()
        .collect();

    out.statuses.sort_by(|a, b| a.name.cmp(&b.name));
    out.logins.sort();
    out.logouts.sort();
    out.batch.deletions.sort();
    out
}
