// ── Notifications ──
//
// Cycle reports go out through a `Notifier`. Delivery is fire-and-forget
// from the scheduler's point of view: failures are logged, never returned
// to the cycle.

pub mod report;
pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::TelegramTarget;

pub use report::SyncReport;
pub use telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Telegram rejected the message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid notifier configuration: {0}")]
    InvalidConfiguration(String),
}

/// Delivers a rendered report to a router's chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: &TelegramTarget, message: &str) -> Result<(), NotifyError>;
}

/// Drops every message. For routers or deployments without a chat.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _target: &TelegramTarget, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}
