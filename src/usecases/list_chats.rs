//! Bulk conversation-list load into the roster.

use crate::domain::{chat::Chat, chat_roster::ChatRoster};

const DEFAULT_CHAT_PAGE_SIZE: usize = 50;
const MAX_CHAT_PAGE_SIZE: usize = 200;

const CHAT_LIST_CONTRACT_VIOLATION: &str = "CHAT_LIST_CONTRACT_VIOLATION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChatsQuery {
    pub limit: usize,
}

impl Default for ListChatsQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CHAT_PAGE_SIZE,
        }
    }
}

impl ListChatsQuery {
    fn normalized_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_CHAT_PAGE_SIZE,
            value if value > MAX_CHAT_PAGE_SIZE => MAX_CHAT_PAGE_SIZE,
            value => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatDirectoryError {
    Unauthorized,
    Unavailable,
    InvalidData,
}

pub trait ChatDirectory {
    fn list_chats(&self, limit: usize) -> Result<Vec<Chat>, ChatDirectoryError>;
}

impl<T> ChatDirectory for &T
where
    T: ChatDirectory + ?Sized,
{
    fn list_chats(&self, limit: usize) -> Result<Vec<Chat>, ChatDirectoryError> {
        (*self).list_chats(limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChatsError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
}

/// Fetches the conversation list and replaces the roster contents. A failed
/// or contract-violating fetch leaves the previous roster untouched.
pub fn load_chat_list(
    source: &dyn ChatDirectory,
    roster: &mut ChatRoster,
    query: ListChatsQuery,
) -> Result<usize, ListChatsError> {
    let limit = query.normalized_limit();
    let chats = source.list_chats(limit).map_err(map_source_error)?;

    for chat in &chats {
        if let Err(violation) = chat.validate() {
            tracing::warn!(
                code = CHAT_LIST_CONTRACT_VIOLATION,
                chat_id = %chat.id,
                error = %violation,
                "conversation list payload violates data contract"
            );
            return Err(ListChatsError::DataContractViolation);
        }
    }

    let count = chats.len();
    roster.replace_all(chats);
    Ok(count)
}

fn map_source_error(error: ChatDirectoryError) -> ListChatsError {
    match error {
        ChatDirectoryError::Unauthorized => ListChatsError::Unauthorized,
        ChatDirectoryError::Unavailable => ListChatsError::TemporarilyUnavailable,
        ChatDirectoryError::InvalidData => ListChatsError::DataContractViolation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::{ChatKind, ChatMember, MemberRole};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;

    struct StubDirectory {
        result: Result<Vec<Chat>, ChatDirectoryError>,
        captured_limit: Mutex<Option<usize>>,
    }

    impl StubDirectory {
        fn with_result(result: Result<Vec<Chat>, ChatDirectoryError>) -> Self {
            Self {
                result,
                captured_limit: Mutex::new(None),
            }
        }
    }

    impl ChatDirectory for StubDirectory {
        fn list_chats(&self, limit: usize) -> Result<Vec<Chat>, ChatDirectoryError> {
            *self.captured_limit.lock().expect("limit lock") = Some(limit);
            self.result.clone()
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn private_chat(id: &str, last_message_secs: i64) -> Chat {
        Chat {
            id: id.to_owned(),
            kind: ChatKind::Private,
            title: None,
            avatar: None,
            members: vec![
                ChatMember {
                    user_id: "u1".to_owned(),
                    role: MemberRole::Member,
                    joined_at: at(0),
                },
                ChatMember {
                    user_id: "u2".to_owned(),
                    role: MemberRole::Member,
                    joined_at: at(0),
                },
            ],
            last_message_at: at(last_message_secs),
            created_by: "u1".to_owned(),
            created_at: at(0),
        }
    }

    #[test]
    fn loads_and_orders_the_roster() {
        let source =
            StubDirectory::with_result(Ok(vec![private_chat("a", 3), private_chat("b", 9)]));
        let mut roster = ChatRoster::new();

        let count = load_chat_list(&source, &mut roster, ListChatsQuery::default())
            .expect("load should succeed");

        assert_eq!(count, 2);
        assert_eq!(roster.chats()[0].id, "b");
        assert_eq!(roster.chats()[1].id, "a");
    }

    #[test]
    fn uses_default_limit_when_query_limit_is_zero() {
        let source = StubDirectory::with_result(Ok(vec![]));
        let mut roster = ChatRoster::new();

        load_chat_list(&source, &mut roster, ListChatsQuery { limit: 0 })
            .expect("load should succeed");

        assert_eq!(*source.captured_limit.lock().expect("limit lock"), Some(50));
    }

    #[test]
    fn caps_limit_to_maximum_boundary() {
        let source = StubDirectory::with_result(Ok(vec![]));
        let mut roster = ChatRoster::new();

        load_chat_list(&source, &mut roster, ListChatsQuery { limit: 999 })
            .expect("load should succeed");

        assert_eq!(
            *source.captured_limit.lock().expect("limit lock"),
            Some(200)
        );
    }

    #[test]
    fn contract_violation_rejects_payload_and_keeps_roster() {
        let mut invalid = private_chat("a", 3);
        invalid.members.pop();
        let source = StubDirectory::with_result(Ok(vec![invalid]));
        let mut roster = ChatRoster::new();
        roster.replace_all(vec![private_chat("keep", 1)]);

        let error = load_chat_list(&source, &mut roster, ListChatsQuery::default())
            .expect_err("must fail");

        assert_eq!(error, ListChatsError::DataContractViolation);
        assert_eq!(roster.chats().len(), 1);
        assert_eq!(roster.chats()[0].id, "keep");
    }

    #[test]
    fn maps_unauthorized_error() {
        let source = StubDirectory::with_result(Err(ChatDirectoryError::Unauthorized));
        let mut roster = ChatRoster::new();

        let error = load_chat_list(&source, &mut roster, ListChatsQuery::default())
            .expect_err("must fail");

        assert_eq!(error, ListChatsError::Unauthorized);
    }

    #[test]
    fn maps_unavailable_error_to_temporarily_unavailable() {
        let source = StubDirectory::with_result(Err(ChatDirectoryError::Unavailable));
        let mut roster = ChatRoster::new();

        let error = load_chat_list(&source, &mut roster, ListChatsQuery::default())
            .expect_err("must fail");

        assert_eq!(error, ListChatsError::TemporarilyUnavailable);
    }
}
