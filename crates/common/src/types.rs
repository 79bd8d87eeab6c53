use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Channel carrying per-user bot notifications.
pub const BOT_NOTIFY_CHANNEL: &str = "bot:notify";

/// Payload published on [`BOT_NOTIFY_CHANNEL`].
///
/// Wire format: `{"telegramId": "<string>", "text": "<string>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyPayload {
    #[serde(rename = "telegramId")]
    pub recipient_id: String,
    pub text: String,
}

impl NotifyPayload {
    pub fn new(recipient_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            text: text.into(),
        }
    }

    /// Extract and validate a payload from a decoded JSON value.
    ///
    /// Both fields must be present and non-empty. A numeric `telegramId` is
    /// accepted and rendered as its decimal string.
    pub fn from_value(value: &Value) -> Result<Self, AppError> {
        let recipient_id = match value.get("telegramId") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        let text = value
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if recipient_id.is_empty() || text.is_empty() {
            return Err(AppError::Validation(
                "notify payload requires non-empty telegramId and text".to_string(),
            ));
        }

        Ok(Self { recipient_id, text })
    }
}

/// A user with unread chat messages, as reported by the backend API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Recipient {
    #[serde(rename = "telegramId", deserialize_with = "string_or_number")]
    pub recipient_id: String,
    #[serde(rename = "unreadCount")]
    pub unread_count: i64,
}

/// Response envelope of the unread-count endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UnreadEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Vec<Recipient>>,
}

impl UnreadEnvelope {
    /// Unwrap the recipient list, rejecting unsuccessful or incomplete envelopes.
    pub fn into_recipients(self) -> Result<Vec<Recipient>, AppError> {
        match (self.success, self.data) {
            (true, Some(recipients)) => Ok(recipients),
            (false, _) => Err(AppError::Upstream(
                "unread endpoint reported success = false".to_string(),
            )),
            (true, None) => Err(AppError::Upstream(
                "unread endpoint response is missing data".to_string(),
            )),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
