//! Messenger gateway: final delivery of a text to one recipient.

use async_trait::async_trait;
use serde::Deserialize;

use pigeon_common::config::AppConfig;
use pigeon_common::error::{AppError, Result};

#[async_trait]
pub trait MessengerGateway: Send + Sync {
    /// Deliver `text` to `recipient_id`. Failures come back as
    /// [`AppError::Delivery`].
    async fn send(&self, recipient_id: &str, text: &str) -> Result<()>;
}

/// Telegram Bot API gateway (`sendMessage`).
pub struct TelegramGateway {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

#[derive(Debug, Deserialize)]
struct TelegramApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramGateway {
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let token = config
            .bot_token
            .clone()
            .ok_or_else(|| AppError::Config("BOT_TOKEN is not configured".to_string()))?;
        Ok(Self::new(config.telegram_api_url.clone(), token))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

#[async_trait]
impl MessengerGateway for TelegramGateway {
    async fn send(&self, recipient_id: &str, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": recipient_id,
            "text": text,
        });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("sendMessage failed: {e}")))?;

        let status = response.status();
        let result: TelegramApiResponse = response.json().await.map_err(|e| {
            AppError::Delivery(format!("Invalid sendMessage response ({status}): {e}"))
        })?;

        if !result.ok || !status.is_success() {
            return Err(AppError::Delivery(format!(
                "Telegram API error ({status}): {}",
                result.description.unwrap_or_default()
            )));
        }

        Ok(())
    }
}
