use rkyv::{Archive, Deserialize, Serialize};

use crate::identity::has_username;
use crate::store::{SharedStore, CHAT_MESSAGES};

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender_id: String,
    pub message: String,
    pub sent_at: u64,
}

/// Append-only; messages are never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Ids follow the send clock but never repeat within one log.
    pub fn next_id(&self, now_ms: u64) -> u64 {
        match self.messages.last() {
            Some(last) => now_ms.max(last.id.saturating_add(1)),
            None => now_ms,
        }
    }

    pub fn append(&mut self, sender_id: &str, message: &str, now_ms: u64) -> &ChatMessage {
        let id = self.next_id(now_ms);
        self.messages.push(ChatMessage {
            id,
            sender_id: sender_id.to_string(),
            message: message.to_string(),
            sent_at: now_ms,
        });
        &self.messages[self.messages.len() - 1]
    }
}

/// Appends the trimmed draft. Requires a username; blank drafts are dropped.
pub fn send_chat<S: SharedStore + ?Sized>(
    store: &mut S,
    sender_id: &str,
    draft: &str,
    now_ms: u64,
) -> Option<ChatMessage> {
    let message = draft.trim();
    if message.is_empty() || !has_username(&*store, sender_id) {
        return None;
    }
    let mut sent = None;
    CHAT_MESSAGES.update(store, ChatLog::new, |log| {
        sent = Some(log.append(sender_id, message, now_ms).clone());
    });
    sent
}

pub fn chat_log<S: SharedStore + ?Sized>(store: &S) -> ChatLog {
    CHAT_MESSAGES.read_or_default(store)
}
