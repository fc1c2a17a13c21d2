//! Per-call conversation sessions keyed by call SID

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use super::dialogue::{Conversation, Step};

/// Key used when the provider sends no call SID
pub const DEFAULT_CALL_SID: &str = "default";

/// Idle time after which a session is dropped
pub const DEFAULT_IDLE_TTL_MINUTES: i64 = 30;

/// Call status values that end a call
pub const TERMINAL_STATUSES: [&str; 5] = ["completed", "busy", "failed", "no-answer", "canceled"];

/// Conversation state for all live calls
#[derive(Clone)]
pub struct SessionStore {
    calls: Arc<Mutex<HashMap<String, Conversation>>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_IDLE_TTL_MINUTES))
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
        }
    }

    /// Begin (or restart) a call's conversation at the category question
    pub async fn start(&self, call_sid: &str) {
        let mut calls = self.calls.lock().await;
        self.prune_locked(&mut calls);
        calls.insert(call_sid.to_string(), Conversation::default());
        tracing::debug!(call_sid, live = calls.len(), "call session started");
    }

    /// Advance a call's conversation, creating it on first contact
    ///
    /// Returns the step taken and a snapshot of the conversation after it.
    pub async fn advance(
        &self,
        call_sid: &str,
        utterance: Option<&str>,
        max_reprompts: u32,
    ) -> (Step, Conversation) {
        let mut calls = self.calls.lock().await;
        self.prune_locked(&mut calls);

        let conversation = calls.entry(call_sid.to_string()).or_default();
        let step = conversation.advance(utterance, max_reprompts);
        (step, conversation.clone())
    }

    /// Snapshot of a call's conversation
    pub async fn get(&self, call_sid: &str) -> Option<Conversation> {
        self.calls.lock().await.get(call_sid).cloned()
    }

    /// Drop a call's conversation
    pub async fn evict(&self, call_sid: &str) -> bool {
        let removed = self.calls.lock().await.remove(call_sid).is_some();
        if removed {
            tracing::debug!(call_sid, "call session evicted");
        }
        removed
    }

    /// Drop every conversation
    pub async fn clear(&self) {
        let mut calls = self.calls.lock().await;
        tracing::debug!(dropped = calls.len(), "all call sessions cleared");
        calls.clear();
    }

    /// Number of live conversations
    pub async fn len(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.calls.lock().await.is_empty()
    }

    /// Drop conversations idle for longer than the TTL
    pub async fn prune(&self) -> usize {
        let mut calls = self.calls.lock().await;
        self.prune_locked(&mut calls)
    }

    fn prune_locked(&self, calls: &mut HashMap<String, Conversation>) -> usize {
        let cutoff = Utc::now() - self.idle_ttl;
        let before = calls.len();
        calls.retain(|_, c| c.last_seen >= cutoff);
        let pruned = before - calls.len();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned idle call sessions");
        }
        pruned
    }
}

/// Whether a provider call status means the call is over
#[must_use]
pub fn is_terminal_status(status: &str) -> bool {
    TERMINAL_STATUSES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(status.trim()))
}
