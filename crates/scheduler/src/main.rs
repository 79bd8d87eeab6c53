//! Pigeon scheduler binary: publishes unread-message reminders.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pigeon_bus::EventPublisher;
use pigeon_bus::redis_transport::RedisBroker;
use pigeon_common::config::AppConfig;
use pigeon_scheduler::cadence::Cadence;
use pigeon_scheduler::dispatcher::UnreadNotifier;
use pigeon_scheduler::service::NotificationScheduler;
use pigeon_scheduler::source::HttpUnreadSource;
use pigeon_scheduler::trigger::CronTrigger;

#[derive(Parser)]
#[command(name = "pigeon-scheduler", version, about = "Unread-message reminder job")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run the recurring job until interrupted (default)
    Run,
    /// Run one dispatch cycle now and exit
    Trigger,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pigeon_scheduler=info,pigeon_bus=info".into()),
        )
        .json()
        .init();

    // Load configuration
    let config = AppConfig::from_env()?;
    let cadence: Cadence = config.notify_cron.parse()?;

    let source = HttpUnreadSource::from_config(&config);
    if !source.is_configured() {
        tracing::warn!("API_URL is not configured; dispatch runs will abort");
    }

    let publisher = Arc::new(EventPublisher::new(Arc::new(RedisBroker::from_config(
        &config,
    )?)));
    publisher.start().await;

    let notifier = Arc::new(UnreadNotifier::new(
        Arc::new(source),
        publisher.clone(),
        config.notify_throttle(),
    ));
    let scheduler = NotificationScheduler::new(notifier, Arc::new(CronTrigger::new(cadence)));

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Trigger => match scheduler.trigger_now().await {
            Ok(summary) => {
                tracing::info!(
                    run_id = %summary.run_id,
                    total = summary.total,
                    published = summary.published,
                    failed = summary.failed,
                    "Manual run completed"
                );
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("manual run failed: {e}")),
        },
        Command::Run => {
            tracing::info!("Pigeon scheduler starting...");
            scheduler.start();

            let signal = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal, stopping gracefully...");
            scheduler.stop();
            signal.map_err(Into::into)
        }
    };

    publisher.stop().await;
    tracing::info!("Pigeon scheduler stopped.");
    result
}
