// RouterOS REST record types
//
// RouterOS renders every scalar as a JSON string ("12345", "true") and
// omits properties that are unset. These types parse that shape into
// strict fields with explicit defaults so nothing downstream has to
// inspect loosely-typed maps.

use serde::{Deserialize, Deserializer, Serialize};

/// Profile assigned by RouterOS when a secret does not name one.
pub const DEFAULT_PROFILE: &str = "default";
/// Service value RouterOS uses for "any PPP service".
pub const DEFAULT_SERVICE: &str = "any";

fn default_profile() -> String {
    DEFAULT_PROFILE.to_owned()
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_owned()
}

// ── Secrets (/ppp/secret) ───────────────────────────────────────────

/// A configured PPP credential.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PppSecret {
    #[serde(rename = ".id")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_profile", deserialize_with = "lenient::profile")]
    pub profile: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub disabled: bool,
    #[serde(rename = "remote-address", default)]
    pub remote_address: Option<String>,
}

/// Body for `PUT /rest/ppp/secret`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPppSecret {
    pub name: String,
    pub password: String,
    pub service: String,
    pub profile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ── Active sessions (/ppp/active) ───────────────────────────────────

/// A live, currently-connected PPP session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PppActive {
    #[serde(rename = ".id")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(rename = "caller-id", default)]
    pub caller_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(rename = "session-id", default)]
    pub session_id: Option<String>,
}

// ── Interfaces (/interface) ─────────────────────────────────────────

/// An interface with its cumulative byte counters.
///
/// Counters are from the router's point of view: `rx_byte` is what the
/// router received on this interface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Interface {
    #[serde(rename = ".id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "rx-byte", default, deserialize_with = "lenient::counter")]
    pub rx_byte: u64,
    #[serde(rename = "tx-byte", default, deserialize_with = "lenient::counter")]
    pub tx_byte: u64,
    #[serde(
        rename = "rx-bits-per-second",
        default,
        deserialize_with = "lenient::counter"
    )]
    pub rx_bits_per_second: u64,
    #[serde(
        rename = "tx-bits-per-second",
        default,
        deserialize_with = "lenient::counter"
    )]
    pub tx_bits_per_second: u64,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub running: bool,
}

// ── Profiles (/ppp/profile) ─────────────────────────────────────────

/// A PPP service profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PppProfile {
    #[serde(rename = ".id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: Option<String>,
}

// ── System ──────────────────────────────────────────────────────────

/// `/system/identity`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SystemIdentity {
    pub name: String,
}

/// RouterOS error body: `{"error": 404, "message": "Not Found", "detail": "..."}`
#[derive(Debug, Deserialize)]
pub(crate) struct RouterOsErrorBody {
    #[serde(default)]
    pub error: Option<u16>,
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}

// ── Lenient scalar decoding ─────────────────────────────────────────

mod lenient {
    use super::{DEFAULT_PROFILE, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Num(u64),
        Bool(bool),
    }

    /// Byte/bit counters. Empty or unparseable strings become 0.
    pub(super) fn counter<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        Ok(match Option::<Scalar>::deserialize(d)? {
            Some(Scalar::Num(n)) => n,
            Some(Scalar::Str(s)) => s.trim().parse().unwrap_or(0),
            Some(Scalar::Bool(_)) | None => 0,
        })
    }

    /// RouterOS booleans: `"true"`/`"false"`, occasionally `"yes"`/`"no"`.
    pub(super) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Option::<Scalar>::deserialize(d)? {
            Some(Scalar::Bool(b)) => b,
            Some(Scalar::Str(s)) => matches!(s.as_str(), "true" | "yes"),
            Some(Scalar::Num(n)) => n != 0,
            None => false,
        })
    }

    /// An empty profile string means the router default.
    pub(super) fn profile<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_owned()))
    }
}
