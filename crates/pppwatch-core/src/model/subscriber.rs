// ── Subscriber domain types ──
//
// `SubscriberRecord` is the persisted per-(router, secret) row that
// carries the counters across sessions. `SubscriberStatus` is the merged
// live view served to readers.

use std::ops::Add;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::router::RouterId;
use crate::error::CoreError;

// ── Counters ────────────────────────────────────────────────────────

/// A transmit/receive pair, from the subscriber's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub tx: u64,
    pub rx: u64,
}

impl Counters {
    pub const ZERO: Self = Self { tx: 0, rx: 0 };

    pub const fn new(tx: u64, rx: u64) -> Self {
        Self { tx, rx }
    }

    pub fn is_zero(&self) -> bool {
        self.tx == 0 && self.rx == 0
    }
}

/// Saturating, so a corrupt stored value pins at `u64::MAX` instead of wrapping.
impl Add for Counters {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            tx: self.tx.saturating_add(rhs.tx),
            rx: self.rx.saturating_add(rhs.rx),
        }
    }
}

// ── Location ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoreError::validation(format!(
                "latitude {latitude} is outside -90..=90"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::validation(format!(
                "longitude {longitude} is outside -180..=180"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

// ── Persisted row ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriberRecord {
    pub router_id: RouterId,
    pub name: String,
    pub profile: Option<String>,
    pub comment: Option<String>,
    pub location: Option<GeoPoint>,
    /// Set only while isolated by us; the profile to restore.
    pub original_profile: Option<String>,
    /// Bytes from completed or reset sessions. Never decreases.
    pub accumulated: Counters,
    /// Last observed counters of the current session; zero while offline.
    pub current: Counters,
    pub is_online: bool,
    pub last_seen_online: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriberRecord {
    /// A fresh row with zeroed counters.
    pub fn new(router_id: RouterId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            router_id,
            name: name.into(),
            profile: None,
            comment: None,
            location: None,
            original_profile: None,
            accumulated: Counters::ZERO,
            current: Counters::ZERO,
            is_online: false,
            last_seen_online: None,
            updated_at: now,
        }
    }

    /// Lifetime usage: accumulated plus the running session.
    pub fn total(&self) -> Counters {
        self.accumulated + self.current
    }

    pub fn is_isolated(&self) -> bool {
        self.original_profile.is_some()
    }
}

// ── Served view ─────────────────────────────────────────────────────

/// One subscriber as shown to readers: device state merged with stored
/// counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriberStatus {
    pub name: String,
    pub service: String,
    pub profile: String,
    pub disabled: bool,
    pub comment: Option<String>,
    pub is_online: bool,
    pub address: Option<String>,
    pub uptime: Option<String>,
    pub caller_id: Option<String>,
    pub current: Counters,
    /// Bits per second, when the router reports it.
    pub rate: Counters,
    pub accumulated: Counters,
    pub total: Counters,
    pub original_profile: Option<String>,
    pub location: Option<GeoPoint>,
}

impl SubscriberStatus {
    pub fn is_isolated(&self) -> bool {
        self.original_profile.is_some()
    }
}

// ── Requests ────────────────────────────────────────────────────────

/// Fields for creating a PPP secret on a router.
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub name: String,
    pub password: SecretString,
    pub profile: String,
    pub service: Option<String>,
    pub comment: Option<String>,
}

impl NewSubscriber {
    pub const DEFAULT_SERVICE: &'static str = "pppoe";

    pub fn service(&self) -> &str {
        self.service
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(Self::DEFAULT_SERVICE)
    }

    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        use secrecy::ExposeSecret;

        if self.name.trim().is_empty() {
            return Err(CoreError::validation("subscriber name must not be empty"));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(CoreError::validation(
                "subscriber name must not contain whitespace",
            ));
        }
        if self.password.expose_secret().is_empty() {
            return Err(CoreError::validation("password must not be empty"));
        }
        if self.profile.trim().is_empty() {
            return Err(CoreError::validation("profile must not be empty"));
        }
        Ok(())
    }
}
