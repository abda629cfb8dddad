//! Member listing for one conversation.

use crate::domain::chat::ChatMember;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembersSourceError {
    Unauthorized,
    Unavailable,
    ChatNotFound,
    InvalidData,
}

pub trait MembersSource {
    fn list_members(&self, chat_id: &str) -> Result<Vec<ChatMember>, MembersSourceError>;
}

impl<T> MembersSource for &T
where
    T: MembersSource + ?Sized,
{
    fn list_members(&self, chat_id: &str) -> Result<Vec<ChatMember>, MembersSourceError> {
        (*self).list_members(chat_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListMembersError {
    Unauthorized,
    TemporarilyUnavailable,
    ChatNotFound,
    DataContractViolation,
}

pub fn list_members(
    source: &dyn MembersSource,
    chat_id: &str,
) -> Result<Vec<ChatMember>, ListMembersError> {
    if chat_id.trim().is_empty() {
        return Err(ListMembersError::ChatNotFound);
    }

    source.list_members(chat_id).map_err(map_source_error)
}

fn map_source_error(error: MembersSourceError) -> ListMembersError {
    match error {
        MembersSourceError::Unauthorized => ListMembersError::Unauthorized,
        MembersSourceError::Unavailable => ListMembersError::TemporarilyUnavailable,
        MembersSourceError::ChatNotFound => ListMembersError::ChatNotFound,
        MembersSourceError::InvalidData => ListMembersError::DataContractViolation,
    }
}
