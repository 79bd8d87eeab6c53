//! Unread-count data source.

use std::time::Duration;

use async_trait::async_trait;

use pigeon_common::config::AppConfig;
use pigeon_common::error::{AppError, Result};
use pigeon_common::types::{Recipient, UnreadEnvelope};

/// Endpoint path, relative to the API base URL.
pub const UNREAD_PATH: &str = "/chats/users-with-unread";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait UnreadSource: Send + Sync {
    /// Users with at least one unread message, in the order to notify them.
    async fn users_with_unread(&self) -> Result<Vec<Recipient>>;
}

/// Queries the backend API over HTTP.
pub struct HttpUnreadSource {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpUnreadSource {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.api_url.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

#[async_trait]
impl UnreadSource for HttpUnreadSource {
    async fn users_with_unread(&self) -> Result<Vec<Recipient>> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| AppError::Config("API_URL is not configured".to_string()))?;

        let response = self
            .client
            .get(format!("{base_url}{UNREAD_PATH}"))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "unread endpoint returned {status}"
            )));
        }

        let envelope: UnreadEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid unread response body: {e}")))?;

        envelope.into_recipients()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_base_url_is_config_error() {
        let source = HttpUnreadSource::new(None);
        assert!(!source.is_configured());
        assert!(matches!(
            source.users_with_unread().await,
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let source = HttpUnreadSource::new(Some("http://api.local/".to_string()));
        assert_eq!(source.base_url.as_deref(), Some("http://api.local"));
    }
}
