//! Session data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gemini::{Conversation, Role, Turn};

/// Server-side conversation state keyed by an identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub conversation: Conversation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, conversation: Conversation) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.conversation.push(turn);
        self.updated_at = Utc::now();
    }

    pub fn turn_count(&self) -> usize {
        self.conversation.len()
    }

    /// Number of turns authored by `role`
    pub fn count_role(&self, role: Role) -> usize {
        self.conversation
            .turns
            .iter()
            .filter(|turn| turn.role == role)
            .count()
    }
}
