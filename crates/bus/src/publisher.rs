//! Fire-and-forget event publisher.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use pigeon_common::error::Result;
use pigeon_common::types::{BOT_NOTIFY_CHANNEL, NotifyPayload};

use crate::transport::{Broker, PublisherConnection};

/// Anything that can emit a notify event for one recipient.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn publish_notify(&self, recipient_id: &str, text: &str) -> Result<()>;
}

/// Publishes JSON events on named channels over its own broker connection.
///
/// `publish` never reports failure to the caller: encoding and transport
/// errors are logged and the event is dropped. A connection that could not be
/// opened, or that failed a publish, is reopened on the next publish.
pub struct EventPublisher {
    broker: Arc<dyn Broker>,
    slot: Mutex<PublisherSlot>,
}

#[derive(Default)]
struct PublisherSlot {
    started: bool,
    connection: Option<Box<dyn PublisherConnection>>,
}

impl EventPublisher {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            slot: Mutex::new(PublisherSlot::default()),
        }
    }

    /// Open the publish connection. No-op when already started.
    ///
    /// A broker outage is logged and does not fail startup.
    pub async fn start(&self) {
        let mut slot = self.slot.lock().await;
        if slot.started {
            return;
        }

        slot.started = true;
        match self.broker.connect_publisher().await {
            Ok(connection) => {
                slot.connection = Some(connection);
                tracing::info!("Event publisher started");
            }
            Err(e) => {
                tracing::error!(error = %e, "Publisher connect failed, retrying on next publish");
            }
        }
    }

    /// Close the publish connection. Safe to call more than once.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        let was_started = std::mem::take(&mut slot.started);
        if let Some(mut connection) = slot.connection.take() {
            connection.close().await;
        }
        if was_started {
            tracing::info!("Event publisher stopped");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.connection.is_some()
    }

    /// Publish an event. Strings go out verbatim, everything else as JSON.
    pub async fn publish<T>(&self, channel: &str, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        let encoded = match encode_payload(payload) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(channel, error = %e, "Failed to encode event, dropping it");
                return;
            }
        };

        let mut slot = self.slot.lock().await;
        if !slot.started {
            tracing::warn!(channel, "Publisher is not started, dropping event");
            return;
        }

        if slot.connection.is_none() {
            match self.broker.connect_publisher().await {
                Ok(connection) => {
                    tracing::info!("Event publisher reconnected");
                    slot.connection = Some(connection);
                }
                Err(e) => {
                    tracing::error!(channel, error = %e, "Publisher still disconnected, dropping event");
                    return;
                }
            }
        }

        let Some(connection) = slot.connection.as_mut() else {
            return;
        };
        match connection.publish(channel, encoded).await {
            Ok(()) => tracing::debug!(channel, "Event published"),
            Err(e) => {
                tracing::error!(channel, error = %e, "Failed to publish event");
                if let Some(mut broken) = slot.connection.take() {
                    broken.close().await;
                }
            }
        }
    }

    /// Publish a bot notification for one recipient on the notify channel.
    pub async fn publish_notify(&self, recipient_id: &str, text: &str) {
        self.publish(BOT_NOTIFY_CHANNEL, &NotifyPayload::new(recipient_id, text))
            .await;
    }
}

#[async_trait]
impl NotifySink for EventPublisher {
    async fn publish_notify(&self, recipient_id: &str, text: &str) -> Result<()> {
        EventPublisher::publish_notify(self, recipient_id, text).await;
        Ok(())
    }
}

/// Encode a payload for the wire.
pub fn encode_payload<T>(payload: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    match serde_json::to_value(payload)? {
        Value::String(raw) => Ok(raw),
        value => Ok(value.to_string()),
    }
}
