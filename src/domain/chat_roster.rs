use chrono::{DateTime, Utc};

use super::chat::Chat;

/// Ordered summary list of conversations, most recent activity first.
///
/// Also mirrors the conversation currently open in the UI so that list
/// updates and the open-conversation header never drift apart. Sorting is
/// stable: conversations with identical activity timestamps keep their prior
/// relative order, which avoids visual jitter on near-simultaneous events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRoster {
    chats: Vec<Chat>,
    active_chat: Option<Chat>,
}

impl ChatRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    /// The mirror of the conversation currently open in the UI, if any.
    pub fn active_chat(&self) -> Option<&Chat> {
        self.active_chat.as_ref()
    }

    /// Marks a conversation as the currently open one. Clears the mirror if
    /// the id is not in the list.
    pub fn set_active(&mut self, chat_id: &str) {
        self.active_chat = self.find(chat_id).cloned();
    }

    /// Bulk load; replaces the whole list and re-derives order.
    pub fn replace_all(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
        self.resort();
        self.refresh_active_mirror();
    }

    /// Updates a conversation's recency marker and re-derives list order.
    /// No-op when the id is unknown; creation goes through `upsert`.
    pub fn touch(&mut self, chat_id: &str, activity_at: DateTime<Utc>) {
        let Some(index) = self.chats.iter().position(|chat| chat.id == chat_id) else {
            return;
        };

        let mut next = self.chats.clone();
        next[index].last_message_at = activity_at;
        self.chats = next;
        self.resort();
        self.refresh_active_mirror();
    }

    /// Inserts a new conversation or overwrites an existing one (new fields
    /// win), then re-derives order. A newly created conversation is not
    /// assumed to be the most recent: its explicit timestamp decides.
    pub fn upsert(&mut self, chat: Chat) {
        let mut next = self.chats.clone();
        match next.iter().position(|existing| existing.id == chat.id) {
            Some(index) => next[index] = chat,
            None => next.insert(0, chat),
        }
        self.chats = next;
        self.resort();
        self.refresh_active_mirror();
    }

    pub fn clear(&mut self) {
        self.chats.clear();
        self.active_chat = None;
    }

    fn find(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id == chat_id)
    }

    fn resort(&mut self) {
        // Stable sort preserves prior relative order on equal timestamps.
        self.chats
            .sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
    }

    fn refresh_active_mirror(&mut self) {
        let Some(active_id) = self.active_chat.as_ref().map(|chat| chat.id.clone()) else {
            return;
        };

        self.active_chat = self.find(&active_id).cloned();
    }
}
