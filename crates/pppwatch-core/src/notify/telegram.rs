// Telegram Bot API transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{Notifier, NotifyError};
use crate::model::TelegramTarget;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Posts messages via `sendMessage` with HTML parse mode.
pub struct TelegramNotifier {
    client: Client,
    api_base: Url,
}

impl TelegramNotifier {
    pub fn new(api_base: Url) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(NotifyError::Network)?;
        Ok(Self::with_client(client, api_base))
    }

    pub fn with_client(client: Client, api_base: Url) -> Self {
        Self { client, api_base }
    }

    fn endpoint(&self, target: &TelegramTarget) -> Result<Url, NotifyError> {
        let base = self.api_base.as_str().trim_end_matches('/');
        let token = target.bot_token.expose_secret();
        Url::parse(&format!("{base}/bot{token}/sendMessage"))
            .map_err(|e| NotifyError::InvalidConfiguration(format!("bad API URL: {e}")))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, target: &TelegramTarget, message: &str) -> Result<(), NotifyError> {
        let url = self.endpoint(target)?;
        debug!(chat_id = %target.chat_id, len = message.len(), "sending telegram message");

        let payload = SendMessage {
            chat_id: &target.chat_id,
            text: message,
            parse_mode: "HTML",
        };
        let response = self.client.post(url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_owned());
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
