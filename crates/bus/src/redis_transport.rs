//! Redis pub/sub transport.

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, PubSub};

use pigeon_common::config::AppConfig;
use pigeon_common::error::Result;
use pigeon_common::redis_pool::{create_redis_client, create_redis_pool};

use crate::transport::{Broker, InboundMessage, PublisherConnection, SubscriberConnection};

/// Broker backed by a Redis server.
pub struct RedisBroker {
    client: redis::Client,
}

impl RedisBroker {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Build the broker from config. Does not connect.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(create_redis_client(config)?))
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn connect_publisher(&self) -> Result<Box<dyn PublisherConnection>> {
        let manager = create_redis_pool(self.client.clone()).await?;
        Ok(Box::new(RedisPublisher { manager }))
    }

    async fn connect_subscriber(&self) -> Result<Box<dyn SubscriberConnection>> {
        let pubsub = self.client.get_async_pubsub().await?;
        tracing::info!("Opened Redis pub/sub connection");
        Ok(Box::new(RedisSubscription {
            pubsub: Some(pubsub),
        }))
    }
}

struct RedisPublisher {
    manager: ConnectionManager,
}

#[async_trait]
impl PublisherConnection for RedisPublisher {
    async fn publish(&mut self, channel: &str, payload: String) -> Result<()> {
        let receivers: i64 = self.manager.publish(channel, payload).await?;
        tracing::trace!(channel, receivers, "Published to Redis");
        Ok(())
    }

    async fn close(&mut self) {
        // The manager shuts its connection down when the last clone is dropped.
        tracing::debug!("Releasing Redis publisher connection");
    }
}

struct RedisSubscription {
    pubsub: Option<PubSub>,
}

#[async_trait]
impl SubscriberConnection for RedisSubscription {
    async fn subscribe(&mut self, channels: &[String]) -> Result<()> {
        if let Some(pubsub) = self.pubsub.as_mut() {
            pubsub.subscribe(channels).await?;
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, channels: &[String]) -> Result<()> {
        if let Some(pubsub) = self.pubsub.as_mut() {
            pubsub.unsubscribe(channels).await?;
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Option<InboundMessage> {
        let pubsub = self.pubsub.as_mut()?;
        let mut stream = std::pin::pin!(pubsub.on_message());

        loop {
            let msg = stream.next().await?;
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => return Some(InboundMessage { channel, payload }),
                Err(e) => {
                    tracing::error!(
                        channel = %channel,
                        error = %e,
                        "Discarding message with non-string payload"
                    );
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.pubsub.take().is_some() {
            tracing::info!("Closed Redis pub/sub connection");
        }
    }
}
