//! Conversation creation, with the result folded into the roster.

use crate::domain::{chat::Chat, chat_roster::ChatRoster};

/// A request to create a conversation on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateChatRequest {
    Private { peer_id: String },
    Group {
        title: String,
        member_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCreatorError {
    Unauthorized,
    Unavailable,
    PeerNotFound,
    InvalidData,
}

pub trait ChatCreator {
    fn create_chat(&self, request: &CreateChatRequest) -> Result<Chat, ChatCreatorError>;
}

impl<T> ChatCreator for &T
where
    T: ChatCreator + ?Sized,
{
    fn create_chat(&self, request: &CreateChatRequest) -> Result<Chat, ChatCreatorError> {
        (*self).create_chat(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateChatError {
    /// The request is missing a peer, title, or members.
    IncompleteRequest,
    Unauthorized,
    TemporarilyUnavailable,
    PeerNotFound,
    DataContractViolation,
}

/// Creates a conversation through the collaborator and upserts the result.
/// The new entry sorts by its explicit timestamp, not by insertion.
pub fn create_chat(
    creator: &dyn ChatCreator,
    roster: &mut ChatRoster,
    request: CreateChatRequest,
) -> Result<Chat, CreateChatError> {
    validate_request(&request)?;

    let chat = creator.create_chat(&request).map_err(map_source_error)?;
    if chat.validate().is_err() {
        return Err(CreateChatError::DataContractViolation);
    }

    roster.upsert(chat.clone());
    Ok(chat)
}

fn validate_request(request: &CreateChatRequest) -> Result<(), CreateChatError> {
    let complete = match request {
        CreateChatRequest::Private { peer_id } => !peer_id.trim().is_empty(),
        CreateChatRequest::Group { title, member_ids } => {
            !title.trim().is_empty() && !member_ids.is_empty()
        }
    };

    if complete {
        Ok(())
    } else {
        Err(CreateChatError::IncompleteRequest)
    }
}

fn map_source_error(error: ChatCreatorError) -> CreateChatError {
    match error {
        ChatCreatorError::Unauthorized => CreateChatError::Unauthorized,
        ChatCreatorError::Unavailable => CreateChatError::TemporarilyUnavailable,
        ChatCreatorError::PeerNotFound => CreateChatError::PeerNotFound,
        ChatCreatorError::InvalidData => CreateChatError::DataContractViolation,
    }
}
