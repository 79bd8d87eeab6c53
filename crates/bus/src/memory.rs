//! In-process broker over a tokio broadcast channel.
//!
//! Behaves like Redis pub/sub for a single process: fire-and-forget, messages
//! published while nobody is subscribed are lost, and each subscription only
//! sees channels it subscribed to.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use pigeon_common::error::{AppError, Result};

use crate::transport::{Broker, InboundMessage, PublisherConnection, SubscriberConnection};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct MemoryBroker {
    messages: broadcast::Sender<InboundMessage>,
    disconnects: broadcast::Sender<()>,
    subscriber_connects: Arc<AtomicUsize>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (messages, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (disconnects, _) = broadcast::channel(1);
        Self {
            messages,
            disconnects,
            subscriber_connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Drop every open subscriber connection, as a broker restart would.
    pub fn drop_subscribers(&self) {
        let _ = self.disconnects.send(());
    }

    /// Number of subscriber connections opened so far.
    pub fn subscriber_connects(&self) -> usize {
        self.subscriber_connects.load(Ordering::SeqCst)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn connect_publisher(&self) -> Result<Box<dyn PublisherConnection>> {
        Ok(Box::new(MemoryPublisher {
            sender: Some(self.messages.clone()),
        }))
    }

    async fn connect_subscriber(&self) -> Result<Box<dyn SubscriberConnection>> {
        self.subscriber_connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySubscription {
            receiver: Some(self.messages.subscribe()),
            disconnect: self.disconnects.subscribe(),
            channels: HashSet::new(),
        }))
    }
}

struct MemoryPublisher {
    sender: Option<broadcast::Sender<InboundMessage>>,
}

#[async_trait]
impl PublisherConnection for MemoryPublisher {
    async fn publish(&mut self, channel: &str, payload: String) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| AppError::Internal("publisher connection closed".to_string()))?;
        // No receivers is not an error: pub/sub drops the message.
        let _ = sender.send(InboundMessage {
            channel: channel.to_string(),
            payload,
        });
        Ok(())
    }

    async fn close(&mut self) {
        self.sender = None;
    }
}

struct MemorySubscription {
    receiver: Option<broadcast::Receiver<InboundMessage>>,
    disconnect: broadcast::Receiver<()>,
    channels: HashSet<String>,
}

#[async_trait]
impl SubscriberConnection for MemorySubscription {
    async fn subscribe(&mut self, channels: &[String]) -> Result<()> {
        self.channels.extend(channels.iter().cloned());
        Ok(())
    }

    async fn unsubscribe(&mut self, channels: &[String]) -> Result<()> {
        for channel in channels {
            self.channels.remove(channel);
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Option<InboundMessage> {
        loop {
            let receiver = self.receiver.as_mut()?;
            let received = tokio::select! {
                _ = self.disconnect.recv() => None,
                received = receiver.recv() => Some(received),
            };

            match received {
                Some(Ok(msg)) if self.channels.contains(&msg.channel) => return Some(msg),
                Some(Ok(_)) => continue,
                Some(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "In-memory subscriber lagged, messages lost");
                }
                Some(Err(RecvError::Closed)) | None => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        self.receiver = None;
        self.channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_only_subscribed_channels_are_received() {
        let broker = MemoryBroker::new();
        let mut sub = broker.connect_subscriber().await.unwrap();
        sub.subscribe(&["a".to_string()]).await.unwrap();

        let mut publisher = broker.connect_publisher().await.unwrap();
        publisher.publish("b", "ignored".to_string()).await.unwrap();
        publisher.publish("a", "kept".to_string()).await.unwrap();

        let msg = sub.next_message().await.unwrap();
        assert_eq!(msg.channel, "a");
        assert_eq!(msg.payload, "kept");
    }

    #[tokio::test]
    async fn test_closed_publisher_rejects_publish() {
        let broker = MemoryBroker::new();
        let mut publisher = broker.connect_publisher().await.unwrap();
        publisher.close().await;
        assert!(publisher.publish("a", "x".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_subscribers_ends_stream() {
        let broker = MemoryBroker::new();
        let mut sub = broker.connect_subscriber().await.unwrap();
        sub.subscribe(&["a".to_string()]).await.unwrap();

        broker.drop_subscribers();
        assert!(sub.next_message().await.is_none());
        assert_eq!(broker.subscriber_connects(), 1);
    }
}
