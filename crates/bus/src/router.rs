//! Per-channel dispatch of inbound events.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Handles decoded events of one channel. Must not panic; failures are the
/// handler's to log.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    async fn handle(&self, payload: Value);
}

/// What the router did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched,
    Malformed,
    UnknownChannel,
}

/// Maps channel names to handlers. The set of registered channels is the
/// subscriber's channel set.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Arc<dyn ChannelHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, channel: impl Into<String>, handler: Arc<dyn ChannelHandler>) -> Self {
        self.handlers.insert(channel.into(), handler);
        self
    }

    /// Registered channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.handlers.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Decode a raw message and hand it to the channel's handler.
    pub async fn route(&self, channel: &str, raw: &str) -> RouteOutcome {
        let payload: Value = match serde_json::from_str(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(channel, error = %e, "Discarding malformed message");
                return RouteOutcome::Malformed;
            }
        };

        tracing::debug!(channel, "Received message");

        match self.handlers.get(channel) {
            Some(handler) => {
                handler.handle(payload).await;
                RouteOutcome::Dispatched
            }
            None => {
                tracing::warn!(channel, "Ignoring message on unknown channel");
                RouteOutcome::UnknownChannel
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl ChannelHandler for Recorder {
        async fn handle(&self, payload: Value) {
            self.seen.lock().unwrap().push(payload);
        }
    }

    #[tokio::test]
    async fn test_routes_to_registered_handler() {
        let recorder = Arc::new(Recorder::default());
        let router = EventRouter::new().with_handler("bot:notify", recorder.clone());

        let outcome = router.route("bot:notify", r#"{"a":1}"#).await;
        assert_eq!(outcome, RouteOutcome::Dispatched);
        assert_eq!(recorder.seen.lock().unwrap()[0], serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_malformed_json_is_discarded() {
        let recorder = Arc::new(Recorder::default());
        let router = EventRouter::new().with_handler("bot:notify", recorder.clone());

        assert_eq!(router.route("bot:notify", "{not json").await, RouteOutcome::Malformed);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_channel_is_ignored() {
        let recorder = Arc::new(Recorder::default());
        let router = EventRouter::new().with_handler("bot:notify", recorder.clone());

        assert_eq!(router.route("bot:other", "{}").await, RouteOutcome::UnknownChannel);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_channels_sorted() {
        let recorder = Arc::new(Recorder::default());
        let router = EventRouter::new()
            .with_handler("b", recorder.clone())
            .with_handler("a", recorder);
        assert_eq!(router.channels(), vec!["a".to_string(), "b".to_string()]);
    }
}
