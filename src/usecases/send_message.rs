//! The send pipeline: turns a user submit action into an outbound frame.
//!
//! The pipeline never inserts a speculative message into the cache. The
//! cache is updated only when the server echoes the confirmed message back
//! through the inbound path, so there is a single source of truth and no
//! client-id reconciliation race.

use crate::{
    domain::message::MessageContent,
    net::{
        connection::ConnectionManager,
        envelope::{self, OutboundFrame, OutboundIntent},
    },
};

/// A user's request to submit one message to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitCommand {
    pub chat_id: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("target conversation id is empty")]
    EmptyChatId,
    #[error("message content is empty")]
    EmptyContent,
    #[error("connection is not open; message was not transmitted")]
    Disconnected,
}

/// Transmits raw frames over the live connection.
pub trait FrameSender {
    /// Returns `false` when the connection is not open.
    fn send_frame(&self, raw: String) -> bool;
}

impl<T: FrameSender + ?Sized> FrameSender for &T {
    fn send_frame(&self, raw: String) -> bool {
        (*self).send_frame(raw)
    }
}

impl FrameSender for ConnectionManager {
    fn send_frame(&self, raw: String) -> bool {
        self.send(raw)
    }
}

/// Validates a submit command, encodes it, and hands it to the connection.
///
/// A refused transmission surfaces as `SubmitError::Disconnected`; callers
/// are responsible for user-visible feedback or retry.
pub fn submit_message(sender: &dyn FrameSender, command: SubmitCommand) -> Result<(), SubmitError> {
    if command.chat_id.trim().is_empty() {
        return Err(SubmitError::EmptyChatId);
    }

    let content = normalize_content(command.content)?;
    let intent = OutboundIntent {
        chat_id: command.chat_id,
        content,
    };
    let raw = envelope::encode(&OutboundFrame::Message(intent));

    if sender.send_frame(raw) {
        Ok(())
    } else {
        Err(SubmitError::Disconnected)
    }
}

fn normalize_content(content: MessageContent) -> Result<MessageContent, SubmitError> {
    match content {
        MessageContent::Text { text } => {
            let text = text.trim().to_owned();
            if text.is_empty() {
                return Err(SubmitError::EmptyContent);
            }
            Ok(MessageContent::Text { text })
        }
        MessageContent::Code { language, code } => {
            if code.trim().is_empty() {
                return Err(SubmitError::EmptyContent);
            }
            Ok(MessageContent::Code { language, code })
        }
        MessageContent::File { file_id, file_name } => {
            if file_id.trim().is_empty() {
                return Err(SubmitError::EmptyContent);
            }
            Ok(MessageContent::File { file_id, file_name })
        }
    }
}
