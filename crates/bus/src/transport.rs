//! Broker transport seams.

use async_trait::async_trait;

use pigeon_common::error::Result;

/// A raw message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: String,
}

/// Outbound half: publishes already-encoded payloads.
#[async_trait]
pub trait PublisherConnection: Send {
    async fn publish(&mut self, channel: &str, payload: String) -> Result<()>;

    async fn close(&mut self);
}

/// Inbound half: a connection in subscriber mode.
#[async_trait]
pub trait SubscriberConnection: Send {
    async fn subscribe(&mut self, channels: &[String]) -> Result<()>;

    async fn unsubscribe(&mut self, channels: &[String]) -> Result<()>;

    /// Wait for the next message. `None` means the connection is gone.
    async fn next_message(&mut self) -> Option<InboundMessage>;

    async fn close(&mut self);
}

/// Opens broker connections. Every call yields a fresh, unshared connection.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn connect_publisher(&self) -> Result<Box<dyn PublisherConnection>>;

    async fn connect_subscriber(&self) -> Result<Box<dyn SubscriberConnection>>;
}
