//! Per-conversation state for multi-step bot dialogs.
//!
//! State is held in-memory per recipient id and resets on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// What the bot is waiting for in one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    /// Next text message is a question for support.
    pub waiting_support_text: bool,
    /// Next text message carries registration details.
    pub waiting_registration: bool,
    /// Invite code captured from the start parameter, pending registration.
    pub pending_invite_code: Option<String>,
}

impl ConversationState {
    fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, ConversationState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConversationState>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state; a conversation never seen before is idle.
    pub fn get(&self, recipient_id: &str) -> ConversationState {
        self.lock().get(recipient_id).cloned().unwrap_or_default()
    }

    /// Mutate the state of one conversation. Idle states are not retained.
    pub fn update<F, R>(&self, recipient_id: &str, f: F) -> R
    where
        F: FnOnce(&mut ConversationState) -> R,
    {
        let mut sessions = self.lock();
        let state = sessions.entry(recipient_id.to_string()).or_default();
        let result = f(state);
        if state.is_idle() {
            sessions.remove(recipient_id);
        }
        result
    }

    pub fn clear(&self, recipient_id: &str) {
        self.lock().remove(recipient_id);
    }

    pub fn begin_support_question(&self, recipient_id: &str) {
        self.update(recipient_id, |s| s.waiting_support_text = true);
    }

    /// Leave support-question mode. Returns whether it was active.
    pub fn finish_support_question(&self, recipient_id: &str) -> bool {
        self.update(recipient_id, |s| std::mem::take(&mut s.waiting_support_text))
    }

    pub fn begin_registration(&self, recipient_id: &str, invite_code: impl Into<String>) {
        let code = invite_code.into();
        self.update(recipient_id, |s| {
            s.waiting_registration = true;
            s.pending_invite_code = Some(code);
        });
    }

    /// Leave registration mode, handing back the pending invite code.
    pub fn finish_registration(&self, recipient_id: &str) -> Option<String> {
        self.update(recipient_id, |s| {
            s.waiting_registration = false;
            s.pending_invite_code.take()
        })
    }

    /// Number of conversations with non-idle state.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}
