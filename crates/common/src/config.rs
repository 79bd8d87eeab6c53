use std::time::Duration;

use serde::Deserialize;

/// Default cadence: minute 0 of every hour divisible by 3.
pub const DEFAULT_NOTIFY_CRON: &str = "0 */3 * * *";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis host (default: localhost)
    pub redis_host: String,

    /// Redis port (default: 6379)
    pub redis_port: u16,

    /// Redis password; `None` when unset or empty
    pub redis_password: Option<String>,

    /// Logical Redis database index (default: 0)
    pub redis_db: i64,

    /// Base URL of the backend API serving unread counts.
    /// Required by dispatch runs; absence aborts the run.
    pub api_url: Option<String>,

    /// Telegram bot token. Required by the notifier binary.
    pub bot_token: Option<String>,

    /// Telegram Bot API base URL
    pub telegram_api_url: String,

    /// Cron expression for the unread notification job
    pub notify_cron: String,

    /// Delay between two recipients of one dispatch run, in milliseconds (default: 100)
    pub notify_throttle_ms: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            redis_host: non_empty("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
            redis_port: non_empty("REDIS_PORT")
                .unwrap_or_else(|| "6379".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("REDIS_PORT must be a valid u16"))?,
            redis_password: non_empty("REDIS_PASSWORD"),
            redis_db: non_empty("REDIS_DB")
                .unwrap_or_else(|| "0".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("REDIS_DB must be a valid i64"))?,
            api_url: non_empty("API_URL").map(|url| url.trim_end_matches('/').to_string()),
            bot_token: non_empty("BOT_TOKEN"),
            telegram_api_url: non_empty("TELEGRAM_API_URL")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            notify_cron: non_empty("NOTIFY_CRON")
                .unwrap_or_else(|| DEFAULT_NOTIFY_CRON.to_string()),
            notify_throttle_ms: non_empty("NOTIFY_THROTTLE_MS")
                .unwrap_or_else(|| "100".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("NOTIFY_THROTTLE_MS must be a valid u64"))?,
        })
    }

    pub fn notify_throttle(&self) -> Duration {
        Duration::from_millis(self.notify_throttle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.redis_host, "localhost");
        assert_eq!(config.redis_port, 6379);
        assert_eq!(config.redis_password, None);
        assert_eq!(config.redis_db, 0);
        assert_eq!(config.api_url, None);
        assert_eq!(config.bot_token, None);
        assert_eq!(config.telegram_api_url, "https://api.telegram.org");
        assert_eq!(config.notify_cron, "0 */3 * * *");
        assert_eq!(config.notify_throttle(), Duration::from_millis(100));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("REDIS_HOST", "redis.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_PASSWORD", "s3cret"),
            ("REDIS_DB", "2"),
            ("API_URL", "https://api.example.com/"),
            ("NOTIFY_THROTTLE_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.redis_host, "redis.internal");
        assert_eq!(config.redis_port, 6380);
        assert_eq!(config.redis_password.as_deref(), Some("s3cret"));
        assert_eq!(config.redis_db, 2);
        assert_eq!(config.api_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.notify_throttle_ms, 250);
    }

    #[test]
    fn test_empty_password_means_none() {
        let config = config_from(&[("REDIS_PASSWORD", "")]).unwrap();
        assert_eq!(config.redis_password, None);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = config_from(&[("REDIS_PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("REDIS_PORT"));
    }
}
