// ── Core error types ──
//
// Errors surfaced by pppwatch-core. Device failures are split into
// "could not reach it" and "reached it but the answer was unusable";
// the scheduler treats both as per-router and never aborts a cycle on
// them. The `From` impls translate transport and storage errors.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Cannot reach router at {host}: {reason}")]
    DeviceUnreachable { host: String, reason: String },

    #[error("Router protocol error: {message}")]
    DeviceProtocol { message: String },

    #[error("Router did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Router not found: {id}")]
    RouterNotFound { id: String },

    #[error("Subscriber {name:?} not found on router {router}")]
    SubscriberNotFound { router: String, name: String },

    // ── Caller errors ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Isolation was asked for on a router without a quarantine profile.
    #[error("Router {router:?} has no quarantine profile configured")]
    NoQuarantineProfile { router: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Storage errors ───────────────────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl CoreError {
    /// Device-side failure that is expected to clear up on its own.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::DeviceUnreachable { .. } | Self::DeviceProtocol { .. } | Self::Timeout { .. }
        )
    }

    pub(crate) fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pppwatch_api::Error> for CoreError {
    fn from(err: pppwatch_api::Error) -> Self {
        use pppwatch_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::DeviceUnreachable {
                host: String::new(),
                reason: format!("authentication failed: {message}"),
            },
            Api::Transport(ref e) if e.is_timeout() => CoreError::Timeout { timeout_secs: 0 },
            Api::Transport(ref e) if err.is_unreachable() => {
                CoreError::DeviceUnreachable {
                    host: e
                        .url()
                        .and_then(|u| u.host_str().map(String::from))
                        .unwrap_or_default(),
                    reason: e.to_string(),
                }
            }
            Api::Transport(e) => CoreError::DeviceProtocol {
                message: e.to_string(),
            },
            Api::InvalidUrl(e) => CoreError::Configuration {
                message: format!("invalid router address: {e}"),
            },
            Api::Tls(reason) => CoreError::DeviceUnreachable {
                host: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            Api::RouterOs {
                status,
                message,
                detail,
            } => CoreError::DeviceProtocol {
                message: match detail {
                    Some(detail) => format!("HTTP {status}: {message} ({detail})"),
                    None => format!("HTTP {status}: {message}"),
                },
            },
            Api::NotFound { menu, name } => CoreError::DeviceProtocol {
                message: format!("no {menu} entry named {name:?}"),
            },
            Api::Deserialization { message, body: _ } => CoreError::DeviceProtocol {
                message: format!("unexpected response: {message}"),
            },
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routeros_error_keeps_detail() {
        let err: CoreError = pppwatch_api::Error::RouterOs {
            status: 400,
            message: "Bad Request".into(),
            detail: Some("no such item".into()),
        }
        .into();

        assert!(err.is_device_error());
        assert_eq!(
            err.to_string(),
            "Router protocol error: HTTP 400: Bad Request (no such item)"
        );
    }

    #[test]
    fn rejected_credentials_are_unreachable() {
        let err: CoreError = pppwatch_api::Error::Authentication {
            message: "router rejected credentials".into(),
        }
        .into();

        assert!(matches!(err, CoreError::DeviceUnreachable { .. }));
    }
}
