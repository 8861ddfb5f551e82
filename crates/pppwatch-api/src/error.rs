use thiserror::Error;

/// Everything that can go wrong talking to a RouterOS REST endpoint.
///
/// The split that matters to callers is "no HTTP answer at all"
/// ([`Error::is_unreachable`]) versus "the router answered, but not with
/// what we asked for". `pppwatch-core` builds its device errors on that line.
#[derive(Debug, Error)]
pub enum Error {
    // ── Session ─────────────────────────────────────────────────────
    /// The router answered 401 to our basic-auth credentials.
    #[error("router rejected login: {message}")]
    Authentication { message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("bad router address: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// CA bundle could not be loaded, or the handshake was refused.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    // ── Router replies ──────────────────────────────────────────────
    /// Non-2xx reply carrying RouterOS's `error`/`message`/`detail` body.
    #[error("router replied {status}: {message}")]
    RouterOs {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    /// A by-name lookup in a menu came back empty.
    #[error("{menu} has no entry named {name:?}")]
    NotFound { menu: &'static str, name: String },

    /// 2xx reply whose body did not decode. `body` is kept for logging.
    #[error("undecodable reply: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// The named item (or the whole menu path) does not exist on the router.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::RouterOs { status: 404, .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// No HTTP response was ever received.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Tls(_) | Self::InvalidUrl(_) => true,
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}
