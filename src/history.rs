//! Append-only conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The model's reply.
    Assistant,
}

/// A recorded conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who produced this entry.
    pub role: Role,
    /// Full text of the entry.
    pub content: String,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Ordered, append-only record of conversation turns.
///
/// Entries are never mutated or reordered after insertion. The user
/// entry for a turn is appended before dispatch starts; the assistant
/// entry only after the reply stream drains successfully, so a failed
/// turn stays user-only.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one turn.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role,
            content: content.into(),
            recorded_at: Utc::now(),
        });
    }

    /// All recorded turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The most recently recorded turn.
    #[must_use]
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Number of recorded turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the log has no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
