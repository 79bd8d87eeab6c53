//! Dispatch run: one pass over the users with unread messages.
//!
//! 1. Query the unread source; any failure aborts the whole run
//! 2. Format one reminder per recipient, in source order
//! 3. Publish it; a failed publish is logged and the run moves on
//! 4. Pause the throttle delay between recipients
//!
//! At most one run is active at a time. A second request while one is in
//! flight gets [`AppError::AlreadyRunning`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use pigeon_bus::NotifySink;
use pigeon_common::error::{AppError, Result};

use crate::message::format_unread_message;
use crate::source::UnreadSource;
use crate::trigger::TickHandler;

/// Default delay between two recipients.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);

/// Outcome counts of one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Recipients returned by the source.
    pub total: usize,
    pub published: usize,
    pub failed: usize,
    /// Recipients with a non-positive unread count.
    pub skipped: usize,
}

pub struct UnreadNotifier {
    source: Arc<dyn UnreadSource>,
    sink: Arc<dyn NotifySink>,
    throttle: Duration,
    in_flight: Mutex<()>,
}

impl UnreadNotifier {
    pub fn new(source: Arc<dyn UnreadSource>, sink: Arc<dyn NotifySink>, throttle: Duration) -> Self {
        Self {
            source,
            sink,
            throttle,
            in_flight: Mutex::new(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Execute one dispatch run unless another is already in flight.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return Err(AppError::AlreadyRunning);
        };

        let run_id = Uuid::new_v4();
        self.dispatch(run_id)
            .instrument(tracing::info_span!("dispatch_run", run_id = %run_id))
            .await
    }

    async fn dispatch(&self, run_id: Uuid) -> Result<RunSummary> {
        tracing::info!("Starting unread notification run");

        let recipients = match self.source.users_with_unread().await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!(error = %e, "Unread query failed, aborting run");
                return Err(e);
            }
        };

        tracing::info!(recipients = recipients.len(), "Found users with unread messages");

        let mut summary = RunSummary {
            run_id,
            total: recipients.len(),
            published: 0,
            failed: 0,
            skipped: 0,
        };

        for (index, recipient) in recipients.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.throttle).await;
            }

            if recipient.unread_count < 1 {
                tracing::warn!(
                    recipient_id = %recipient.recipient_id,
                    unread_count = recipient.unread_count,
                    "Skipping recipient without unread messages"
                );
                summary.skipped += 1;
                continue;
            }

            let text = format_unread_message(recipient.unread_count);
            match self.sink.publish_notify(&recipient.recipient_id, &text).await {
                Ok(()) => {
                    summary.published += 1;
                    tracing::info!(
                        recipient_id = %recipient.recipient_id,
                        unread_count = recipient.unread_count,
                        "Unread notification queued"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        recipient_id = %recipient.recipient_id,
                        error = %e,
                        "Failed to queue unread notification"
                    );
                }
            }
        }

        tracing::info!(
            total = summary.total,
            published = summary.published,
            failed = summary.failed,
            skipped = summary.skipped,
            "Unread notification run finished"
        );

        Ok(summary)
    }
}

#[async_trait]
impl TickHandler for UnreadNotifier {
    async fn on_tick(&self) {
        match self.run_once().await {
            Ok(_) => {}
            Err(AppError::AlreadyRunning) => {
                tracing::warn!("Previous unread notification run still in progress, skipping tick");
            }
            // Already logged inside the run.
            Err(e) => tracing::debug!(error = %e, "Scheduled run aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use pigeon_common::types::Recipient;

    struct FixedSource(Vec<Recipient>);

    #[async_trait]
    impl UnreadSource for FixedSource {
        async fn users_with_unread(&self) -> Result<Vec<Recipient>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl NotifySink for RecordingSink {
        async fn publish_notify(&self, recipient_id: &str, text: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn recipient(id: &str, count: i64) -> Recipient {
        Recipient {
            recipient_id: id.to_string(),
            unread_count: count,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_counts_are_skipped() {
        let sink = Arc::new(RecordingSink::default());
        let notifier = UnreadNotifier::new(
            Arc::new(FixedSource(vec![recipient("A", 0), recipient("B", 2)])),
            sink.clone(),
            DEFAULT_THROTTLE,
        );

        let summary = notifier.run_once().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.published, 1);
        assert_eq!(sink.sent.lock().unwrap()[0].0, "B");
    }

    #[tokio::test]
    async fn test_empty_source_publishes_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let notifier =
            UnreadNotifier::new(Arc::new(FixedSource(vec![])), sink.clone(), DEFAULT_THROTTLE);

        let summary = notifier.run_once().await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(sink.sent.lock().unwrap().is_empty());
        assert!(!notifier.is_running());
    }
}
