//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use pppwatch_config::ConfigError;
use pppwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Router connection ────────────────────────────────────────────
    #[error("Could not reach router {host}: {reason}")]
    #[diagnostic(
        code(pppwatch::connection_failed),
        help(
            "Check that the router is up and the REST API (www-ssl or www) is enabled.\n\
             Try: pppwatch routers test <ROUTER>"
        )
    )]
    ConnectionFailed { host: String, reason: String },

    #[error("Router rejected the API credentials")]
    #[diagnostic(
        code(pppwatch::auth_failed),
        help("Update them with: pppwatch routers update <ROUTER> --username <USER> --password")
    )]
    AuthFailed,

    #[error("Router answered with an error: {message}")]
    #[diagnostic(code(pppwatch::device))]
    Device { message: String },

    #[error("Router did not answer within {seconds}s")]
    #[diagnostic(
        code(pppwatch::timeout),
        help("Raise device.timeout_secs in the config file or check the router's load.")
    )]
    Timeout { seconds: u64 },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(pppwatch::not_found),
        help("Run: pppwatch {list_command}")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(pppwatch::conflict), help("Pass --yes (-y) to overwrite it."))]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pppwatch::validation))]
    Validation { field: String, reason: String },

    #[error("Router '{router}' has no quarantine profile configured")]
    #[diagnostic(
        code(pppwatch::no_quarantine_profile),
        help(
            "Isolation needs a quarantine profile on the router.\n\
             Set one with: pppwatch routers update <ROUTER> --quarantine-profile <PROFILE>"
        )
    )]
    NoQuarantineProfile { router: String },

    // ── Configuration & storage ──────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(pppwatch::config),
        help("Inspect the resolved settings with: pppwatch config show")
    )]
    Config(#[from] ConfigError),

    #[error("Storage error: {message}")]
    #[diagnostic(code(pppwatch::storage))]
    Storage { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(pppwatch::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(pppwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    #[diagnostic(code(pppwatch::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::NoQuarantineProfile { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DeviceUnreachable { reason, .. }
                if reason.starts_with("authentication failed") =>
            {
                CliError::AuthFailed
            }

            CoreError::DeviceUnreachable { host, reason } => CliError::ConnectionFailed {
                host: if host.is_empty() { "(unknown)".into() } else { host },
                reason,
            },

            CoreError::DeviceProtocol { message } => CliError::Device { message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::RouterNotFound { id } => CliError::NotFound {
                resource_type: "router".into(),
                identifier: id,
                list_command: "routers list".into(),
            },

            CoreError::SubscriberNotFound { router, name } => CliError::NotFound {
                resource_type: "subscriber".into(),
                identifier: name,
                list_command: format!("subscribers list {router}"),
            },

            CoreError::NoQuarantineProfile { router } => CliError::NoQuarantineProfile { router },

            CoreError::Configuration { message } => CliError::Validation {
                field: "router".into(),
                reason: message,
            },

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Storage { message } => CliError::Storage { message },
        }
    }
}
