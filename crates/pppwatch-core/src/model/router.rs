// ── Router domain types ──
//
// A managed RouterOS device plus the operator-supplied settings that
// drive sync, isolation and notification for it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::CoreError;

/// REST over HTTPS.
pub const DEFAULT_PORT: u16 = 443;

// ── RouterId ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterId(Uuid);

impl RouterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RouterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RouterId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| CoreError::RouterNotFound { id: s.to_owned() })
    }
}

impl From<Uuid> for RouterId {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Telegram bot credentials for one router's sync reports.
#[derive(Debug, Clone)]
pub struct TelegramTarget {
    pub bot_token: SecretString,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Router {
    pub id: RouterId,
    /// Display name. Replaced by the router's identity on `sync_now`.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip)]
    pub password: SecretString,
    pub use_tls: bool,
    /// Inactive routers are skipped by the scheduler.
    pub active: bool,
    /// Profile applied when a subscriber is isolated.
    pub quarantine_profile: Option<String>,
    #[serde(skip)]
    pub telegram: Option<TelegramTarget>,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Router {
    /// `http(s)://host:port`
    pub fn base_url(&self) -> Result<Url, CoreError> {
        let scheme = if self.use_tls { "https" } else { "http" };
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        Url::parse(&format!("{scheme}://{host}:{}", self.port)).map_err(|e| {
            CoreError::Configuration {
                message: format!("invalid router address {:?}: {e}", self.host),
            }
        })
    }

    /// Quarantine profile, if one is configured and non-blank.
    pub fn quarantine_profile(&self) -> Option<&str> {
        self.quarantine_profile
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn has_telegram(&self) -> bool {
        self.telegram.is_some()
    }
}

// ── Requests ────────────────────────────────────────────────────────

/// Fields for registering a router.
#[derive(Debug, Clone)]
pub struct NewRouter {
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: SecretString,
    pub use_tls: bool,
    pub active: Option<bool>,
    pub quarantine_profile: Option<String>,
    pub telegram_bot_token: Option<SecretString>,
    pub telegram_chat_id: Option<String>,
}

/// Partial router update. `None` leaves a field untouched; the nested
/// `Option`s distinguish "clear" (`Some(None)`) from "keep".
#[derive(Debug, Clone, Default)]
pub struct RouterUpdate {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub use_tls: Option<bool>,
    pub active: Option<bool>,
    pub quarantine_profile: Option<Option<String>>,
    pub telegram: Option<Option<TelegramTarget>>,
}

impl NewRouter {
    pub(crate) fn into_router(self, now: DateTime<Utc>) -> Result<Router, CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("router name must not be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(CoreError::validation("router host must not be empty"));
        }
        if self.username.trim().is_empty() {
            return Err(CoreError::validation("router username must not be empty"));
        }
        let telegram = telegram_target(self.telegram_bot_token, self.telegram_chat_id);

        let router = Router {
            id: RouterId::new(),
            name: self.name.trim().to_owned(),
            host: self.host.trim().to_owned(),
            port: self.port.unwrap_or(DEFAULT_PORT),
            username: self.username,
            password: self.password,
            use_tls: self.use_tls,
            active: self.active.unwrap_or(true),
            quarantine_profile: self.quarantine_profile.filter(|p| !p.trim().is_empty()),
            telegram,
            last_sync: None,
            created_at: now,
        };
        router.base_url()?;
        Ok(router)
    }
}

impl RouterUpdate {
    pub(crate) fn apply(self, router: &mut Router) -> Result<(), CoreError> {
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(CoreError::validation("router name must not be empty"));
            }
            router.name = name.trim().to_owned();
        }
        if let Some(host) = self.host {
            router.host = host.trim().to_owned();
        }
        if let Some(port) = self.port {
            router.port = port;
        }
        if let Some(username) = self.username {
            router.username = username;
        }
        if let Some(password) = self.password {
            router.password = password;
        }
        if let Some(use_tls) = self.use_tls {
            router.use_tls = use_tls;
        }
        if let Some(active) = self.active {
            router.active = active;
        }
        if let Some(profile) = self.quarantine_profile {
            router.quarantine_profile = profile.filter(|p| !p.trim().is_empty());
        }
        if let Some(telegram) = self.telegram {
            router.telegram = telegram;
        }
        router.base_url()?;
        Ok(())
    }
}

/// Both halves are required; a token without a chat (or vice versa) is dropped.
pub fn telegram_target(
    bot_token: Option<SecretString>,
    chat_id: Option<String>,
) -> Option<TelegramTarget> {
    let chat_id = chat_id.filter(|c| !c.trim().is_empty())?;
    bot_token.map(|bot_token| TelegramTarget { bot_token, chat_id })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_router(host: &str) -> NewRouter {
        NewRouter {
            name: "Tower A".into(),
            host: host.into(),
            port: None,
            username: "api".into(),
            password: SecretString::from("pw".to_string()),
            use_tls: true,
            active: None,
            quarantine_profile: Some("  ".into()),
            telegram_bot_token: Some(SecretString::from("123:abc".to_string())),
            telegram_chat_id: None,
        }
    }

    #[test]
    fn new_router_applies_defaults() {
        let router = new_router("10.0.0.1").into_router(Utc::now()).unwrap();

        assert_eq!(router.port, DEFAULT_PORT);
        assert!(router.active);
        assert_eq!(router.quarantine_profile(), None);
        assert!(!router.has_telegram());
        assert_eq!(router.base_url().unwrap().as_str(), "https://10.0.0.1/");
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let mut router = new_router("fd00::1").into_router(Utc::now()).unwrap();
        router.use_tls = false;
        router.port = 8080;

        assert_eq!(router.base_url().unwrap().as_str(), "http://[fd00::1]:8080/");
    }

    #[test]
    fn blank_host_is_rejected() {
        let err = new_router("  ").into_router(Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn update_can_clear_quarantine_profile() {
        let mut router = new_router("10.0.0.1").into_router(Utc::now()).unwrap();
        router.quarantine_profile = Some("ISOLIR".into());

        RouterUpdate {
            quarantine_profile: Some(None),
            active: Some(false),
            ..RouterUpdate::default()
        }
        .apply(&mut router)
        .unwrap();

        assert_eq!(router.quarantine_profile(), None);
        assert!(!router.active);
    }

    #[test]
    fn router_id_round_trips_through_display() {
        let id = RouterId::new();
        assert_eq!(id.to_string().parse::<RouterId>().unwrap(), id);
        assert!("not-a-uuid".parse::<RouterId>().is_err());
    }
}
