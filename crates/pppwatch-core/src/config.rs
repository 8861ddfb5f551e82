// ── Runtime engine configuration ──
//
// Timing and policy knobs for the monitor. The binary builds this from
// its config file and hands it in; core never reads files itself.

use std::time::Duration;

/// TLS verification strategy for router connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. Routers almost always run self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between scheduler ticks.
    pub sync_interval: Duration,
    /// A cycle running longer than this is considered wedged and superseded.
    pub stuck_cycle_ceiling: Duration,
    /// Deadline after which a running cycle is cancelled.
    pub cycle_deadline: Duration,
    /// Freshness window of the serving cache.
    pub cache_ttl: Duration,
    /// Bound on the live fetch made on a cache miss.
    pub live_fetch_timeout: Duration,
    /// Per-request timeout against a router.
    pub device_timeout: Duration,
    /// TCP/TLS connect timeout against a router.
    pub connect_timeout: Duration,
    pub tls: TlsVerification,
    /// Restore target when a quarantined subscriber has no stored profile.
    pub fallback_profile: String,
    /// How many completed sessions `router_usage` returns per subscriber.
    pub recent_sessions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(30),
            stuck_cycle_ceiling: Duration::from_secs(120),
            cycle_deadline: Duration::from_secs(90),
            cache_ttl: Duration::from_secs(45),
            live_fetch_timeout: Duration::from_secs(3),
            device_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            tls: TlsVerification::default(),
            fallback_profile: "default".into(),
            recent_sessions: 5,
        }
    }
}
