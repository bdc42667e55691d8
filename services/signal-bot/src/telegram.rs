//! Telegram Bot API Client

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::types::{BotError, MessageChannel, ParseMode, Result};

/// Default Bot API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Client for posting to a single Telegram chat or channel
pub struct TelegramClient {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(base_url: &str, bot_token: &str, chat_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BotError::Delivery(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    /// Send a text message
    pub async fn send_text(&self, text: &str, parse_mode: ParseMode) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);

        let req = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode,
        };

        debug!("Sending {} chars to {}", text.len(), self.chat_id);

        // The token is part of the URL, keep it out of error strings
        let response = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| BotError::Delivery(e.without_url().to_string()))?;

        let status = response.status();
        let body: SendMessageResponse = response.json().await.unwrap_or_default();

        if status.is_success() && body.ok {
            Ok(())
        } else {
            Err(BotError::Delivery(format!(
                "Telegram sendMessage failed: {} - {}",
                status,
                body.description.unwrap_or_default()
            )))
        }
    }
}

#[async_trait::async_trait]
impl MessageChannel for TelegramClient {
    async fn send_message(&self, text: &str, mode: ParseMode) -> Result<()> {
        TelegramClient::send_text(self, text, mode).await
    }

    fn channel_id(&self) -> &str {
        &self.chat_id
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: ParseMode,
}

#[derive(Debug, Deserialize, Default)]
struct SendMessageResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}
