//! Pigeon notifier binary: delivers `bot:notify` events to Telegram.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pigeon_bus::redis_transport::RedisBroker;
use pigeon_bus::{EventRouter, EventSubscriber};
use pigeon_common::config::AppConfig;
use pigeon_common::types::BOT_NOTIFY_CHANNEL;
use pigeon_notifier::gateway::TelegramGateway;
use pigeon_notifier::handler::NotifyHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pigeon_notifier=info,pigeon_bus=info".into()),
        )
        .json()
        .init();

    tracing::info!("Pigeon notifier starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    let gateway = TelegramGateway::from_config(&config)?;
    let broker = RedisBroker::from_config(&config)?;

    let router = EventRouter::new().with_handler(
        BOT_NOTIFY_CHANNEL,
        Arc::new(NotifyHandler::new(Arc::new(gateway))),
    );
    let subscriber = EventSubscriber::new(Arc::new(broker), router);

    subscriber.start().await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, stopping gracefully...");

    subscriber.stop().await;

    tracing::info!("Pigeon notifier stopped.");
    Ok(())
}
