//! Configuration for the pppwatch daemon and CLI.
//!
//! Layered with figment: built-in defaults, then the TOML file, then
//! `PPPWATCH_`-prefixed environment variables (`__` separates sections,
//! e.g. `PPPWATCH_SYNC__INTERVAL_SECS=60`). Translates into
//! `pppwatch_core::EngineConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use pppwatch_core::notify::telegram::DEFAULT_API_BASE;
use pppwatch_core::{EngineConfig, TlsVerification};

/// `database.url` value selecting a throwaway in-memory database.
pub const MEMORY_DATABASE: &str = "memory";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub isolation: IsolationConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite URL, or `"memory"`. Defaults to `pppwatch.db` in the
    /// platform data directory.
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// A cycle older than this is abandoned and a new one started.
    #[serde(default = "default_stuck_ceiling")]
    pub stuck_ceiling_secs: u64,
    /// A cycle running longer than this is cancelled.
    #[serde(default = "default_cycle_deadline")]
    pub cycle_deadline_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            stuck_ceiling_secs: default_stuck_ceiling(),
            cycle_deadline_secs: default_cycle_deadline(),
        }
    }
}

fn default_interval() -> u64 {
    30
}
fn default_stuck_ceiling() -> u64 {
    120
}
fn default_cycle_deadline() -> u64 {
    90
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_live_fetch_timeout")]
    pub live_fetch_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            live_fetch_timeout_ms: default_live_fetch_timeout(),
        }
    }
}

fn default_ttl() -> u64 {
    45
}
fn default_live_fetch_timeout() -> u64 {
    3_000
}

/// How router TLS certificates are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsSetting {
    /// Accept self-signed certificates (RouterOS default).
    #[default]
    Insecure,
    /// Verify against the system roots.
    System,
    /// Verify against `device.ca_cert`.
    CustomCa,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub tls: TlsSetting,
    pub ca_cert: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_device_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            tls: TlsSetting::default(),
            ca_cert: None,
        }
    }
}

fn default_device_timeout() -> u64 {
    10
}
fn default_connect_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IsolationConfig {
    /// Restore target when nothing better is known.
    #[serde(default = "default_fallback_profile")]
    pub fallback_profile: String,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            fallback_profile: default_fallback_profile(),
        }
    }
}

fn default_fallback_profile() -> String {
    "default".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// When set, `run` also writes a daily-rolling log file here.
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Engine settings, validated.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        if self.sync.interval_secs == 0 {
            return Err(invalid("sync.interval_secs", "must be greater than zero"));
        }
        if self.sync.cycle_deadline_secs > self.sync.stuck_ceiling_secs {
            return Err(invalid(
                "sync.cycle_deadline_secs",
                format!(
                    "{} exceeds sync.stuck_ceiling_secs ({})",
                    self.sync.cycle_deadline_secs, self.sync.stuck_ceiling_secs
                ),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs", "must be greater than zero"));
        }
        if self.isolation.fallback_profile.trim().is_empty() {
            return Err(invalid("isolation.fallback_profile", "must not be empty"));
        }

        let tls = match self.device.tls {
            TlsSetting::Insecure => TlsVerification::DangerAcceptInvalid,
            TlsSetting::System => TlsVerification::SystemDefaults,
            TlsSetting::CustomCa => {
                let path = self.device.ca_cert.clone().ok_or_else(|| {
                    invalid("device.ca_cert", "required when device.tls = \"custom-ca\"")
                })?;
                TlsVerification::CustomCa(path)
            }
        };

        Ok(EngineConfig {
            sync_interval: Duration::from_secs(self.sync.interval_secs),
            stuck_cycle_ceiling: Duration::from_secs(self.sync.stuck_ceiling_secs),
            cycle_deadline: Duration::from_secs(self.sync.cycle_deadline_secs),
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            live_fetch_timeout: Duration::from_millis(self.cache.live_fetch_timeout_ms),
            device_timeout: Duration::from_secs(self.device.timeout_secs),
            connect_timeout: Duration::from_secs(self.device.connect_timeout_secs),
            tls,
            fallback_profile: self.isolation.fallback_profile.trim().to_owned(),
            ..EngineConfig::default()
        })
    }

    /// sqlx connection URL for the configured database.
    pub fn database_url(&self) -> String {
        match self.database.url.as_deref().map(str::trim) {
            Some(MEMORY_DATABASE) => "sqlite::memory:".into(),
            Some(url) if !url.is_empty() => url.to_owned(),
            _ => format!("sqlite://{}", data_dir().join("pppwatch.db").display()),
        }
    }

    pub fn telegram_api_base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.telegram.api_base)
            .map_err(|e| invalid("telegram.api_base", format!("{e}")))
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "pppwatch", "pppwatch")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || fallback_dir(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where the default database lives.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || fallback_dir(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn fallback_dir(under_home: &str) -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
        .join(under_home)
        .join("pppwatch")
}

// ── Loading ─────────────────────────────────────────────────────────

fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PPPWATCH_").split("__"))
}

/// Load from `path` (or the default location) plus the environment. A
/// missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    Ok(figment(&path).extract()?)
}

/// Render as TOML.
pub fn to_toml(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

/// Write a config file, creating parent directories.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_toml(cfg)?)?;
    Ok(())
}
