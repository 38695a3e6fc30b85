//! Transcript reconciliation.
//!
//! Streamed transcript fragments arrive per speaker turn. The reconciler keeps
//! one open ("ephemeral") message per role and merges deltas into it in place,
//! so the conversation stays ordered by the moment each turn was opened no
//! matter when the finalization event arrives.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::base::TranscriptRole;

/// Lifecycle status of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// User turn in progress
    Speaking,
    /// Assistant turn in progress
    Processing,
    /// Authoritative text received
    Final,
}

/// One finalized or in-flight utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub role: TranscriptRole,
    pub text: String,
    pub status: MessageStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ConversationMessage {
    pub fn is_final(&self) -> bool {
        self.status == MessageStatus::Final
    }
}

/// Open-message handles, one slot per role.
#[derive(Debug, Default)]
struct OpenHandles {
    user: Option<String>,
    assistant: Option<String>,
}

impl OpenHandles {
    fn slot(&mut self, role: TranscriptRole) -> &mut Option<String> {
        match role {
            TranscriptRole::User => &mut self.user,
            TranscriptRole::Assistant => &mut self.assistant,
        }
    }

    fn get(&self, role: TranscriptRole) -> Option<&str> {
        match role {
            TranscriptRole::User => self.user.as_deref(),
            TranscriptRole::Assistant => self.assistant.as_deref(),
        }
    }
}

/// Authoritative, ordered conversation transcript.
///
/// Callers must observe one in-flight turn per role: a `close` is never
/// followed by an `append` for the same turn without a fresh `open`. The
/// reconciler does not re-validate this.
#[derive(Debug, Default)]
pub struct TranscriptReconciler {
    messages: Vec<ConversationMessage>,
    open: OpenHandles,
}

impl TranscriptReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new turn for `role`.
    ///
    /// A still-empty message left open for the same role is removed first, so
    /// the conversation never holds more than one empty placeholder per role.
    pub fn open(&mut self, role: TranscriptRole, initial_text: &str) -> &ConversationMessage {
        if let Some(stale_id) = self.open.slot(role).take()
            && let Some(pos) = self.position(&stale_id)
            && self.messages[pos].text.is_empty()
        {
            self.messages.remove(pos);
            tracing::trace!(%role, id = %stale_id, "Removed empty placeholder");
        }

        let id = uuid::Uuid::new_v4().to_string();
        let status = match role {
            TranscriptRole::User => MessageStatus::Speaking,
            TranscriptRole::Assistant => MessageStatus::Processing,
        };
        *self.open.slot(role) = Some(id.clone());
        self.messages.push(ConversationMessage {
            id,
            role,
            text: initial_text.to_string(),
            status,
            timestamp: OffsetDateTime::now_utc(),
        });

        let last = self.messages.len() - 1;
        &self.messages[last]
    }

    /// Append a delta to the open turn of `role`. No-op when none is open.
    pub fn append(&mut self, role: TranscriptRole, fragment: &str) -> Option<&ConversationMessage> {
        let pos = self.open_position(role)?;
        let message = &mut self.messages[pos];
        message.text.push_str(fragment);
        Some(message)
    }

    /// Finalize the open turn of `role` with the authoritative text.
    /// No-op when none is open.
    pub fn close(&mut self, role: TranscriptRole, final_text: &str) -> Option<&ConversationMessage> {
        let pos = self.open_position(role)?;
        *self.open.slot(role) = None;
        let message = &mut self.messages[pos];
        message.text = final_text.to_string();
        message.status = MessageStatus::Final;
        Some(message)
    }

    /// The open message for `role`, if any.
    pub fn open_message(&self, role: TranscriptRole) -> Option<&ConversationMessage> {
        let id = self.open.get(role)?;
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn is_open(&self, role: TranscriptRole) -> bool {
        self.open_message(role).is_some()
    }

    /// Messages in the order their turns were opened.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message and open handle.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.open = OpenHandles::default();
    }

    fn open_position(&self, role: TranscriptRole) -> Option<usize> {
        let id = self.open.get(role)?;
        self.position(id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }
}
