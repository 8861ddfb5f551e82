// pppwatch-api: Async Rust client for the MikroTik RouterOS REST API

pub mod error;
pub mod routeros;
pub mod transport;

pub use error::Error;
pub use routeros::RouterOsClient;
pub use routeros::models::{
    Interface, NewPppSecret, PppActive, PppProfile, PppSecret, SystemIdentity,
};
pub use transport::{TlsMode, TransportConfig};
