use super::{chat::Chat, message::Message};

/// A decoded inbound event from the live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A full, server-confirmed message (new or corrected).
    ChatMessage(Message),
    /// A member went online or offline.
    PresenceChange { user_id: String, online: bool },
    /// A member started or stopped typing in a conversation.
    Typing {
        chat_id: String,
        user_id: String,
        is_typing: bool,
    },
    /// Conversation metadata changed (members, title, creation).
    ChatUpdate(Chat),
}
