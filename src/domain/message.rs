use chrono::{DateTime, Utc};

/// Kind of a chat message, as declared on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Code,
    File,
}

impl MessageKind {
    /// Returns the tag used for inbound message frames.
    pub fn wire_tag(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Code => "code",
            MessageKind::File => "file",
        }
    }
}

/// Kind-tagged message payload.
///
/// Exactly one shape exists per kind; a message can never carry both a text
/// body and a file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text { text: String },
    Code { language: String, code: String },
    File { file_id: String, file_name: String },
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageContent::Text { .. } => MessageKind::Text,
            MessageContent::Code { .. } => MessageKind::Code,
            MessageContent::File { .. } => MessageKind::File,
        }
    }

    /// Returns a short display form for list previews.
    pub fn preview(&self) -> String {
        match self {
            MessageContent::Text { text } => text.clone(),
            MessageContent::Code { language, .. } => format!("[Code: {language}]"),
            MessageContent::File { file_name, .. } => format!("[File] {file_name}"),
        }
    }
}

/// A single (reader, read-at) pair attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReceipt {
    pub user_id: String,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned identity; opaque to the client.
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: MessageContent,
    pub read_by: Vec<ReadReceipt>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }
}
