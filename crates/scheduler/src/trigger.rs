//! Recurring triggers.
//!
//! A trigger owns the "when" of a job; the [`TickHandler`] owns the "what".
//! Every firing runs the handler on its own task, so stopping a trigger never
//! cancels a run already in flight.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::{mpsc, oneshot};

use crate::cadence::Cadence;

/// Delay before looking again when the cadence yields no next firing.
const NO_FIRING_RETRY: Duration = Duration::from_secs(3600);

#[async_trait]
pub trait TickHandler: Send + Sync {
    async fn on_tick(&self);
}

pub trait RecurringTrigger: Send + Sync {
    /// Start firing `handler` until the returned handle is stopped or dropped.
    fn schedule(&self, handler: Arc<dyn TickHandler>) -> TriggerHandle;
}

/// Stops a scheduled trigger. Stopping is idempotent and also happens on drop.
pub struct TriggerHandle {
    stop: Option<oneshot::Sender<()>>,
}

impl TriggerHandle {
    fn new(stop: oneshot::Sender<()>) -> Self {
        Self { stop: Some(stop) }
    }

    fn inert() -> Self {
        Self { stop: None }
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    pub fn is_active(&self) -> bool {
        self.stop.as_ref().is_some_and(|stop| !stop.is_closed())
    }
}

impl Drop for TriggerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fires on a wall-clock [`Cadence`] in local time.
pub struct CronTrigger {
    cadence: Cadence,
}

impl CronTrigger {
    pub fn new(cadence: Cadence) -> Self {
        Self { cadence }
    }
}

impl RecurringTrigger for CronTrigger {
    fn schedule(&self, handler: Arc<dyn TickHandler>) -> TriggerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let cadence = self.cadence.clone();

        tokio::spawn(async move {
            let mut last_fire = None;
            loop {
                let now = Local::now();
                // Never compute from before the previous firing, or an early
                // wakeup would fire the same slot twice.
                let base = match last_fire {
                    Some(previous) if previous > now => previous,
                    _ => now,
                };
                let Some(next) = cadence.next_after(&base) else {
                    tracing::error!(
                        cadence = cadence.expression(),
                        retry_secs = NO_FIRING_RETRY.as_secs(),
                        "No upcoming firing found, retrying later"
                    );
                    tokio::select! {
                        _ = &mut stop_rx => {
                            tracing::debug!("Cron trigger stopped");
                            return;
                        }
                        _ = tokio::time::sleep(NO_FIRING_RETRY) => {}
                    }
                    continue;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::debug!(next_fire = %next, "Next tick scheduled");

                tokio::select! {
                    _ = &mut stop_rx => {
                        tracing::debug!("Cron trigger stopped");
                        return;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                last_fire = Some(next);
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler.on_tick().await;
                });
            }
        });

        tracing::info!(cadence = self.cadence.expression(), "Cron trigger armed");
        TriggerHandle::new(stop_tx)
    }
}

/// Fires only when [`ManualTrigger::fire`] is called.
pub struct ManualTrigger {
    fire_tx: mpsc::UnboundedSender<()>,
    fire_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<()>>>>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        Self {
            fire_tx,
            fire_rx: Arc::new(Mutex::new(Some(fire_rx))),
        }
    }

    /// Request one firing. Firings requested while nothing is scheduled are
    /// delivered once a handler is scheduled.
    pub fn fire(&self) {
        let _ = self.fire_tx.send(());
    }
}

impl Default for ManualTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl RecurringTrigger for ManualTrigger {
    fn schedule(&self, handler: Arc<dyn TickHandler>) -> TriggerHandle {
        let taken = self
            .fire_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(mut fire_rx) = taken else {
            tracing::warn!("Manual trigger is already scheduled");
            return TriggerHandle::inert();
        };

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let slot = self.fire_rx.clone();

        tokio::spawn(async move {
            loop {
                let fired = tokio::select! {
                    _ = &mut stop_rx => false,
                    fired = fire_rx.recv() => fired.is_some(),
                };
                if !fired {
                    break;
                }

                let handler = handler.clone();
                tokio::spawn(async move {
                    handler.on_tick().await;
                });
            }

            // Hand the receiver back so the trigger can be scheduled again.
            *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(fire_rx);
        });

        TriggerHandle::new(stop_tx)
    }
}
