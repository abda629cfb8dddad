use std::collections::HashMap;

use super::message::Message;

/// Per-conversation ordered message store.
///
/// Each entry is ascending by `created_at` and unique by message id. Entries
/// are populated lazily (history load) or incrementally (live merge) and are
/// never pruned. Mutation is copy-and-replace: a new sequence is built and
/// swapped in, so a reader holding the previous slice never observes a
/// half-updated one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCache {
    entries: HashMap<String, Vec<Message>>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached sequence for a conversation, empty if never
    /// populated. Never `None`, to simplify callers.
    pub fn get(&self, chat_id: &str) -> &[Message] {
        self.entries.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True once a conversation has been populated, even with zero messages.
    pub fn contains(&self, chat_id: &str) -> bool {
        self.entries.contains_key(chat_id)
    }

    /// Replaces the full cached sequence for a conversation with a history
    /// snapshot, re-establishing ascending timestamp order.
    pub fn replace_all(&mut self, chat_id: &str, mut messages: Vec<Message>) {
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.entries.insert(chat_id.to_owned(), messages);
    }

    /// Inserts-or-updates one message by identity.
    ///
    /// An existing id is overwritten field-wise, keeping its position when
    /// the timestamp is unchanged and re-sorting otherwise. A new id is
    /// inserted at its timestamp position, after any equal timestamps so
    /// arrival order breaks ties. Merging the same message twice leaves the
    /// cache unchanged after the first merge.
    pub fn merge(&mut self, chat_id: &str, message: Message) {
        let mut next = self.entries.get(chat_id).cloned().unwrap_or_default();

        match next.iter().position(|existing| existing.id == message.id) {
            Some(index) => {
                let timestamp_unchanged = next[index].created_at == message.created_at;
                next[index] = message;
                if !timestamp_unchanged {
                    next.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                }
            }
            None => {
                let insert_at =
                    next.partition_point(|existing| existing.created_at <= message.created_at);
                next.insert(insert_at, message);
            }
        }

        self.entries.insert(chat_id.to_owned(), next);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
