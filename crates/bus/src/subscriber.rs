//! Event subscriber with its own inbound connection and read loop.
//!
//! Teardown order is fixed: unsubscribe from every channel, then close the
//! connection. `stop()` is safe whatever state `start()` reached. A broker
//! that is down at startup is retried in the background like a dropped
//! connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::router::EventRouter;
use crate::transport::{Broker, InboundMessage, SubscriberConnection};

/// First delay before reconnecting a dropped subscriber connection.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for the reconnect delay.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

enum SubscriberState {
    Idle,
    Running {
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<()>,
    },
    Stopped,
}

pub struct EventSubscriber {
    broker: Arc<dyn Broker>,
    router: Arc<EventRouter>,
    channels: Vec<String>,
    initial_backoff: Duration,
    max_backoff: Duration,
    state: Mutex<SubscriberState>,
}

impl EventSubscriber {
    pub fn new(broker: Arc<dyn Broker>, router: EventRouter) -> Self {
        let channels = router.channels();
        Self {
            broker,
            router: Arc::new(router),
            channels,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            state: Mutex::new(SubscriberState::Idle),
        }
    }

    /// Override the reconnect backoff bounds.
    pub fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, SubscriberState::Running { .. })
    }

    /// Open the connection, subscribe to all channels in one call and spawn
    /// the read loop. No-op unless the subscriber is idle.
    ///
    /// If the broker cannot be reached the read loop starts in its reconnect
    /// backoff instead.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if !matches!(*state, SubscriberState::Idle) {
            return;
        }

        let connection = match self.broker.connect_subscriber().await {
            Ok(mut connection) => match connection.subscribe(&self.channels).await {
                Ok(()) => Some(connection),
                Err(e) => {
                    tracing::error!(error = %e, channels = ?self.channels, "Subscribe failed, retrying in background");
                    teardown(connection.as_mut(), &self.channels).await;
                    None
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Subscriber connect failed, retrying in background");
                None
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let read_loop = ReadLoop {
            broker: self.broker.clone(),
            router: self.router.clone(),
            channels: self.channels.clone(),
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
        };
        let connected = connection.is_some();
        let task = tokio::spawn(read_loop.run(connection, shutdown_rx));

        *state = SubscriberState::Running {
            shutdown: shutdown_tx,
            task,
        };
        tracing::info!(channels = ?self.channels, connected, "Event subscriber started");
    }

    /// Unsubscribe, then close the connection. Safe to call repeatedly.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, SubscriberState::Stopped) {
            SubscriberState::Idle | SubscriberState::Stopped => {
                tracing::debug!("Event subscriber has no connection to release");
            }
            SubscriberState::Running { shutdown, task } => {
                let _ = shutdown.send(());
                if let Err(e) = task.await {
                    tracing::error!(error = %e, "Subscriber read loop ended abnormally");
                }
                tracing::info!("Event subscriber stopped");
            }
        }
    }
}

async fn teardown(connection: &mut dyn SubscriberConnection, channels: &[String]) {
    if let Err(e) = connection.unsubscribe(channels).await {
        tracing::warn!(error = %e, "Unsubscribe failed during teardown");
    }
    connection.close().await;
}

enum LoopEvent {
    Shutdown,
    Message(InboundMessage),
    Disconnected,
}

struct ReadLoop {
    broker: Arc<dyn Broker>,
    router: Arc<EventRouter>,
    channels: Vec<String>,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl ReadLoop {
    async fn run(
        self,
        connection: Option<Box<dyn SubscriberConnection>>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut connection = match connection {
            Some(connection) => connection,
            None => match self.reconnect(&mut shutdown).await {
                Some(fresh) => fresh,
                None => return,
            },
        };

        loop {
            let event = tokio::select! {
                _ = &mut shutdown => LoopEvent::Shutdown,
                msg = connection.next_message() => match msg {
                    Some(msg) => LoopEvent::Message(msg),
                    None => LoopEvent::Disconnected,
                },
            };

            match event {
                LoopEvent::Shutdown => {
                    teardown(connection.as_mut(), &self.channels).await;
                    return;
                }
                LoopEvent::Message(msg) => {
                    // Delivery may be slow; keep reading while it runs.
                    let router = self.router.clone();
                    tokio::spawn(async move {
                        router.route(&msg.channel, &msg.payload).await;
                    });
                }
                LoopEvent::Disconnected => {
                    tracing::warn!("Subscriber connection dropped, reconnecting");
                    connection.close().await;
                    match self.reconnect(&mut shutdown).await {
                        Some(fresh) => connection = fresh,
                        None => return,
                    }
                }
            }
        }
    }

    /// Reconnect with exponential backoff. `None` when shutdown was requested.
    async fn reconnect(
        &self,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> Option<Box<dyn SubscriberConnection>> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1u32;

        loop {
            tokio::select! {
                _ = &mut *shutdown => return None,
                _ = tokio::time::sleep(backoff) => {}
            }

            match self.broker.connect_subscriber().await {
                Ok(mut connection) => match connection.subscribe(&self.channels).await {
                    Ok(()) => {
                        tracing::info!(attempt, "Subscriber reconnected");
                        return Some(connection);
                    }
                    Err(e) => {
                        tracing::warn!(attempt, error = %e, "Resubscribe failed");
                        teardown(connection.as_mut(), &self.channels).await;
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Reconnect failed"
                    );
                }
            }

            backoff = (backoff * 2).min(self.max_backoff);
            attempt += 1;
        }
    }
}
