//! Handler for the `bot:notify` channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use pigeon_bus::ChannelHandler;
use pigeon_common::types::NotifyPayload;

use crate::gateway::MessengerGateway;

/// Result of handling one notify event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    /// Payload lacked a recipient or text; nothing was sent.
    Invalid,
    /// The gateway reported a failure.
    Failed,
}

pub struct NotifyHandler {
    gateway: Arc<dyn MessengerGateway>,
}

impl NotifyHandler {
    pub fn new(gateway: Arc<dyn MessengerGateway>) -> Self {
        Self { gateway }
    }

    /// Validate the payload and send it through the gateway.
    pub async fn deliver(&self, payload: &Value) -> NotifyOutcome {
        let notify = match NotifyPayload::from_value(payload) {
            Ok(notify) => notify,
            Err(e) => {
                tracing::warn!(payload = %payload, error = %e, "bot:notify payload rejected");
                return NotifyOutcome::Invalid;
            }
        };

        match self.gateway.send(&notify.recipient_id, &notify.text).await {
            Ok(()) => {
                tracing::debug!(recipient_id = %notify.recipient_id, "Notification delivered");
                NotifyOutcome::Delivered
            }
            Err(e) => {
                tracing::error!(
                    recipient_id = %notify.recipient_id,
                    error = %e,
                    "Notification delivery failed"
                );
                NotifyOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl ChannelHandler for NotifyHandler {
    async fn handle(&self, payload: Value) {
        self.deliver(&payload).await;
    }
}
