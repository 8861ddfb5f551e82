// ── Device snapshot types ──
//
// Typed copies of what one poll read from a router. The reconciler
// works exclusively on these.

use serde::Serialize;

use super::subscriber::Counters;

/// A configured PPP secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Secret {
    pub name: String,
    pub service: String,
    pub profile: String,
    pub comment: Option<String>,
    pub disabled: bool,
}

/// A live PPP session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSession {
    /// Device-side handle, used to drop the session.
    pub id: String,
    pub name: String,
    pub service: String,
    pub address: Option<String>,
    pub uptime: Option<String>,
    pub caller_id: Option<String>,
}

/// Counters of one interface, already flipped to the subscriber's
/// point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceCounters {
    pub name: String,
    pub bytes: Counters,
    pub rate: Counters,
}

/// Everything one poll reads from a router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub secrets: Vec<Secret>,
    pub active: Vec<ActiveSession>,
    pub interfaces: Vec<InterfaceCounters>,
}
