//! Lifecycle of the unread notification job.

use std::sync::{Arc, Mutex, MutexGuard};

use pigeon_common::error::{AppError, Result};

use crate::dispatcher::{RunSummary, UnreadNotifier};
use crate::trigger::{RecurringTrigger, TriggerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Binds an [`UnreadNotifier`] to a [`RecurringTrigger`].
///
/// Construction performs no I/O and arms nothing; `start()` arms the trigger
/// and `stop()` disarms it. Both are idempotent.
pub struct NotificationScheduler {
    notifier: Arc<UnreadNotifier>,
    trigger: Arc<dyn RecurringTrigger>,
    handle: Mutex<Option<TriggerHandle>>,
}

impl NotificationScheduler {
    pub fn new(notifier: Arc<UnreadNotifier>, trigger: Arc<dyn RecurringTrigger>) -> Self {
        Self {
            notifier,
            trigger,
            handle: Mutex::new(None),
        }
    }

    fn handle(&self) -> MutexGuard<'_, Option<TriggerHandle>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SchedulerState {
        match *self.handle() {
            Some(_) => SchedulerState::Running,
            None => SchedulerState::Stopped,
        }
    }

    pub fn start(&self) {
        let mut handle = self.handle();
        if handle.is_some() {
            return;
        }

        *handle = Some(self.trigger.schedule(self.notifier.clone()));
        tracing::info!("Unread notification job scheduled");
    }

    /// Disarm the trigger. A run already in flight keeps going.
    pub fn stop(&self) {
        if let Some(mut handle) = self.handle().take() {
            handle.stop();
            tracing::info!("Unread notification job stopped");
        }
    }

    /// Run one dispatch cycle now, outside the schedule.
    pub async fn trigger_now(&self) -> Result<RunSummary> {
        tracing::info!("Manual unread notification run requested");
        let result = self.notifier.run_once().await;
        if let Err(AppError::AlreadyRunning) = &result {
            tracing::warn!("Unread notification run already in progress, manual run skipped");
        }
        result
    }
}
