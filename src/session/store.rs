//! Session store: in-memory map from identifier to conversation

use super::models::Session;
use crate::gemini::{Conversation, Turn};
use crate::metrics::METRICS;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Session store errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session ID not found: {0}")]
    NotFound(String),
}

/// How new session identifiers are assigned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionIdStrategy {
    /// Random UUID v4 tokens
    #[default]
    Random,
    /// Decimal counter starting at "1"
    Sequential,
}

/// Storage backend for chat sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Snapshot of a session, if present
    async fn get(&self, id: &str) -> Option<Session>;

    /// Create a session holding `conversation` under a fresh identifier
    async fn create(&self, conversation: Conversation) -> Session;

    /// Append a turn and return the updated snapshot
    async fn append_turn(&self, id: &str, turn: Turn) -> Result<Session, SessionError>;

    /// Number of stored sessions
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-lifetime store backed by a concurrent map
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
    strategy: SessionIdStrategy,
    counter: AtomicU64,
}

impl InMemorySessionStore {
    pub fn new(strategy: SessionIdStrategy) -> Self {
        Self {
            sessions: DashMap::new(),
            strategy,
            counter: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> String {
        match self.strategy {
            SessionIdStrategy::Random => uuid::Uuid::new_v4().simple().to_string(),
            SessionIdStrategy::Sequential => {
                (self.counter.fetch_add(1, Ordering::Relaxed) + 1).to_string()
            }
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(SessionIdStrategy::default())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    async fn create(&self, conversation: Conversation) -> Session {
        loop {
            let id = self.next_id();
            if let Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                let session = Session::new(id, conversation);
                slot.insert(session.clone());
                METRICS.record_session_created();
                info!("Created session: id={}", session.id);
                return session;
            }
            debug!("Session id collision, regenerating: id={}", id);
        }
    }

    async fn append_turn(&self, id: &str, turn: Turn) -> Result<Session, SessionError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        entry.push_turn(turn);
        debug!("Appended turn: session={}, turns={}", id, entry.turn_count());
        Ok(entry.value().clone())
    }

    async fn len(&self) -> usize {
        self.sessions.len()
    }
}
