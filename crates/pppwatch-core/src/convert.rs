// ── API-to-domain type conversions ──
//
// Bridges raw `pppwatch_api` records into `pppwatch_core::model` snapshot
// types. Interface counters are flipped here, once: the router's rx is
// the subscriber's tx.

use pppwatch_api::{Interface, NewPppSecret, PppActive, PppSecret};
use secrecy::ExposeSecret;

use crate::model::{ActiveSession, Counters, InterfaceCounters, NewSubscriber, Secret};

/// Empty strings from RouterOS mean "unset".
fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

impl From<PppSecret> for Secret {
    fn from(raw: PppSecret) -> Self {
        Self {
            name: raw.name,
            service: raw.service,
            profile: raw.profile,
            comment: non_empty(raw.comment),
            disabled: raw.disabled,
        }
    }
}

impl From<PppActive> for ActiveSession {
    fn from(raw: PppActive) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            service: raw.service,
            address: non_empty(raw.address),
            uptime: non_empty(raw.uptime),
            caller_id: non_empty(raw.caller_id),
        }
    }
}

impl From<Interface> for InterfaceCounters {
    fn from(raw: Interface) -> Self {
        Self {
            name: raw.name,
            bytes: Counters::new(raw.rx_byte, raw.tx_byte),
            rate: Counters::new(raw.rx_bits_per_second, raw.tx_bits_per_second),
        }
    }
}

impl From<&NewSubscriber> for NewPppSecret {
    fn from(req: &NewSubscriber) -> Self {
        Self {
            name: req.name.trim().to_owned(),
            password: req.password.expose_secret().to_owned(),
            service: req.service().to_owned(),
            profile: req.profile.trim().to_owned(),
            comment: non_empty(req.comment.clone()),
        }
    }
}
