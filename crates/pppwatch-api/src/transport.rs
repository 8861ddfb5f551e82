// HTTP client construction for router sessions.
//
// TLS and timeout policy are decided once here; each session builds its
// own `reqwest::Client` from a `TransportConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

/// How a router's certificate is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Platform trust store.
    System,
    /// Trust only the PEM bundle at this path (plus the platform store).
    CustomCa(PathBuf),
    /// No verification. RouterOS ships self-signed certificates.
    DangerAcceptInvalid,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request bound, body included.
    pub timeout: Duration,
    /// TCP plus TLS handshake bound.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("pppwatch/", env!("CARGO_PKG_VERSION")));

        let builder = match &self.tls {
            TlsMode::System => builder,
            TlsMode::CustomCa(path) => builder.add_root_certificate(load_ca(path)?),
            TlsMode::DangerAcceptInvalid => builder.danger_accept_invalid_certs(true),
        };

        builder.build().map_err(Error::Transport)
    }
}

fn load_ca(path: &Path) -> Result<reqwest::Certificate, Error> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::Tls(format!("cannot read CA bundle {}: {e}", path.display())))?;
    reqwest::Certificate::from_pem(&pem)
        .map_err(|e| Error::Tls(format!("CA bundle {} is not valid PEM: {e}", path.display())))
}
