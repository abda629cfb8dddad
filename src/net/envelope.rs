//! Wire codec for the live connection.
//!
//! Inbound frames are the server's persisted message echoes plus presence,
//! typing, and conversation-update notifications. Outbound frames carry the client's
//! intent in the server's compact submit shape, where a text message is
//! tagged `"chat"` even though the stored kind is `"text"`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::{
    chat::{Chat, ChatContractViolation, ChatKind, ChatMember, MemberRole},
    events::ServerEvent,
    message::{Message, MessageContent, ReadReceipt},
};

const PRESENCE_TAG: &str = "presence";
const TYPING_TAG: &str = "typing";
const CHAT_UPDATE_TAG: &str = "chatUpdate";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("frame has no type tag")]
    MissingType,
    #[error("unknown frame type {0:?}")]
    UnknownType(String),
    #[error("frame payload does not match schema for type {kind:?}: {source}")]
    PayloadSchema {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("message content does not match declared kind {kind:?}")]
    ContentShapeMismatch { kind: String },
    #[error("unknown chat kind {0:?}")]
    UnknownChatKind(String),
    #[error("unknown member role {0:?}")]
    UnknownMemberRole(String),
    #[error(transparent)]
    ChatContract(#[from] ChatContractViolation),
}

/// A locally-originated action ready to be framed for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundIntent {
    pub chat_id: String,
    pub content: MessageContent,
}

/// Everything the client may put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Message(OutboundIntent),
    Typing { chat_id: String, is_typing: bool },
    ReadReceipt {
        chat_id: String,
        message_ids: Vec<String>,
    },
}

/// Decodes one inbound frame into a tagged event.
pub fn decode(raw: &str) -> Result<ServerEvent, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::Malformed)?;
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();

    match tag.as_str() {
        PRESENCE_TAG => {
            let frame: PresenceFrame = from_tagged_value(&tag, value)?;
            Ok(ServerEvent::PresenceChange {
                user_id: frame.user_id,
                online: frame.online,
            })
        }
        TYPING_TAG => {
            let frame: TypingFrame = from_tagged_value(&tag, value)?;
            Ok(ServerEvent::Typing {
                chat_id: frame.chat_id,
                user_id: frame.user_id,
                is_typing: frame.is_typing,
            })
        }
        CHAT_UPDATE_TAG => {
            let frame: ChatUpdateFrame = from_tagged_value(&tag, value)?;
            let chat = frame.chat.into_domain()?;
            chat.validate()?;
            Ok(ServerEvent::ChatUpdate(chat))
        }
        "text" | "code" | "file" => {
            let frame: MessageFrame = from_tagged_value(&tag, value)?;
            Ok(ServerEvent::ChatMessage(frame.into_domain(&tag)?))
        }
        other => Err(DecodeError::UnknownType(other.to_owned())),
    }
}

/// Serializes an outbound frame, omitting metadata fields that are not
/// relevant to the declared kind.
pub fn encode(frame: &OutboundFrame) -> String {
    let value = match frame {
        OutboundFrame::Message(intent) => match &intent.content {
            MessageContent::Text { text } => json!({
                "type": "chat",
                "chatId": intent.chat_id,
                "content": text,
            }),
            MessageContent::Code { language, code } => json!({
                "type": "code",
                "chatId": intent.chat_id,
                "content": code,
                "language": language,
            }),
            MessageContent::File { file_id, file_name } => json!({
                "type": "file",
                "chatId": intent.chat_id,
                "content": file_id,
                "fileName": file_name,
            }),
        },
        OutboundFrame::Typing { chat_id, is_typing } => json!({
            "type": "typing",
            "chatId": chat_id,
            "isTyping": is_typing,
        }),
        OutboundFrame::ReadReceipt {
            chat_id,
            message_ids,
        } => json!({
            "type": "read",
            "chatId": chat_id,
            "messageIds": message_ids,
        }),
    };

    value.to_string()
}

fn from_tagged_value<T: serde::de::DeserializeOwned>(
    kind: &str,
    value: Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::PayloadSchema {
        kind: kind.to_owned(),
        source,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceFrame {
    user_id: String,
    online: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypingFrame {
    chat_id: String,
    user_id: String,
    is_typing: bool,
}

#[derive(Debug, Deserialize)]
struct ChatUpdateFrame {
    chat: WireChat,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageFrame {
    id: String,
    chat_id: String,
    sender_id: String,
    content: WireContent,
    #[serde(default)]
    read_by: Vec<WireReadReceipt>,
    created_at: DateTime<Utc>,
}

impl MessageFrame {
    fn into_domain(self, kind: &str) -> Result<Message, DecodeError> {
        let content = self.content.reconstruct(kind)?;
        Ok(Message {
            id: self.id,
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            content,
            read_by: self
                .read_by
                .into_iter()
                .map(|receipt| ReadReceipt {
                    user_id: receipt.user_id,
                    read_at: receipt.read_at,
                })
                .collect(),
            created_at: self.created_at,
        })
    }
}

/// The server's loose content record: one optional field per kind.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireContent {
    text: Option<String>,
    code: Option<WireCode>,
    file_id: Option<String>,
    file_name: Option<String>,
}

impl WireContent {
    /// Rebuilds the tagged content union. A declared kind whose payload
    /// field is missing, or that carries a conflicting field, is a decode
    /// error rather than a partial object.
    fn reconstruct(self, kind: &str) -> Result<MessageContent, DecodeError> {
        let mismatch = || DecodeError::ContentShapeMismatch {
            kind: kind.to_owned(),
        };

        match kind {
            "text" => match (self.text, self.code, self.file_id) {
                (Some(text), None, None) => Ok(MessageContent::Text { text }),
                _ => Err(mismatch()),
            },
            "code" => match (self.code, self.text, self.file_id) {
                (Some(code), None, None) => Ok(MessageContent::Code {
                    language: code.language,
                    code: code.content,
                }),
                _ => Err(mismatch()),
            },
            "file" => match (self.file_id, self.file_name, self.text, self.code) {
                (Some(file_id), Some(file_name), None, None) => Ok(MessageContent::File {
                    file_id,
                    file_name,
                }),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCode {
    language: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReadReceipt {
    user_id: String,
    read_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChat {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
    avatar: Option<String>,
    members: Vec<WireChatMember>,
    last_message_at: DateTime<Utc>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl WireChat {
    fn into_domain(self) -> Result<Chat, DecodeError> {
        let kind = match self.kind.as_str() {
            "private" => ChatKind::Private,
            "group" => ChatKind::Group,
            other => return Err(DecodeError::UnknownChatKind(other.to_owned())),
        };

        let members = self
            .members
            .into_iter()
            .map(WireChatMember::into_domain)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Chat {
            id: self.id,
            kind,
            title: self.title,
            avatar: self.avatar,
            members,
            last_message_at: self.last_message_at,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChatMember {
    user_id: String,
    role: String,
    joined_at: DateTime<Utc>,
}

impl WireChatMember {
    fn into_domain(self) -> Result<ChatMember, DecodeError> {
        let role = match self.role.as_str() {
            "owner" => MemberRole::Owner,
            "member" => MemberRole::Member,
            other => return Err(DecodeError::UnknownMemberRole(other.to_owned())),
        };

        Ok(ChatMember {
            user_id: self.user_id,
            role,
            joined_at: self.joined_at,
        })
    }
}
