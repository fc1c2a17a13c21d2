//! Chat histories, one per UI session

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Who said a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
}

/// One entry of a chat history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Append-only ordered history of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn push(&mut self, role: ChatRole, content: impl Into<String>) {
        self.turns.push(ChatTurn {
            role,
            content: content.into(),
        });
    }

    #[must_use]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Idle time after which a chat session is dropped
pub const CHAT_IDLE_TTL_MINUTES: i64 = 30;

struct Session {
    history: ChatHistory,
    last_seen: DateTime<Utc>,
}

/// Shared map of session id to history
///
/// A session exists once its first turn is appended and is dropped after
/// sitting idle for longer than the TTL.
#[derive(Clone)]
pub struct ChatSessions {
    inner: Arc<RwLock<HashMap<String, Session>>>,
    idle_ttl: Duration,
}

impl Default for ChatSessions {
    fn default() -> Self {
        Self::with_idle_ttl(Duration::minutes(CHAT_IDLE_TTL_MINUTES))
    }
}

impl ChatSessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl,
        }
    }

    /// Session id for a request, issuing a fresh one when none is given
    ///
    /// Nothing is stored until a turn is appended.
    #[must_use]
    pub fn resolve_id(session_id: Option<&str>) -> String {
        session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string)
    }

    /// Append a turn to a session, creating it if needed
    pub async fn append(&self, session_id: &str, role: ChatRole, content: impl Into<String>) {
        let mut sessions = self.inner.write().await;
        self.prune_locked(&mut sessions);

        let session = sessions.entry(session_id.to_string()).or_insert_with(|| {
            tracing::debug!(session_id, "chat session started");
            Session {
                history: ChatHistory::default(),
                last_seen: Utc::now(),
            }
        });
        session.history.push(role, content);
        session.last_seen = Utc::now();
    }

    /// Snapshot of a session's history
    pub async fn history(&self, session_id: &str) -> Option<ChatHistory> {
        self.inner
            .read()
            .await
            .get(session_id)
            .map(|s| s.history.clone())
    }

    /// End a session, dropping its history
    pub async fn end(&self, session_id: &str) -> bool {
        let removed = self.inner.write().await.remove(session_id).is_some();
        if removed {
            tracing::debug!(session_id, "chat session ended");
        }
        removed
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Drop sessions idle for longer than the TTL
    pub async fn prune(&self) -> usize {
        let mut sessions = self.inner.write().await;
        self.prune_locked(&mut sessions)
    }

    fn prune_locked(&self, sessions: &mut HashMap<String, Session>) -> usize {
        let cutoff = Utc::now() - self.idle_ttl;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_seen >= cutoff);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned idle chat sessions");
        }
        pruned
    }
}
