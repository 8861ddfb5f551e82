// RouterOS v7 REST API
//
// Stateless JSON-over-HTTP access to the `/rest` menu tree.

pub mod client;
pub mod models;
mod ppp;
mod system;

pub use client::RouterOsClient;
