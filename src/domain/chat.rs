use chrono::{DateTime, Utc};

/// Kind of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatKind {
    /// 1-to-1 conversation between exactly two members.
    #[default]
    Private,
    /// Named group with at least one owner.
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Owner,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMember {
    pub user_id: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: String,
    pub kind: ChatKind,
    /// Required for groups, `None` for private chats.
    pub title: Option<String>,
    pub avatar: Option<String>,
    pub members: Vec<ChatMember>,
    pub last_message_at: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Structural invariant violations for a conversation payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatContractViolation {
    #[error("private chat {chat_id} has {member_count} members, expected exactly 2")]
    PrivateMemberCount {
        chat_id: String,
        member_count: usize,
    },
    #[error("group chat {chat_id} has no owner")]
    GroupWithoutOwner { chat_id: String },
    #[error("group chat {chat_id} has no title")]
    GroupWithoutTitle { chat_id: String },
}

impl Chat {
    /// Checks the membership invariants from the data contract.
    pub fn validate(&self) -> Result<(), ChatContractViolation> {
        match self.kind {
            ChatKind::Private => {
                if self.members.len() != 2 {
                    return Err(ChatContractViolation::PrivateMemberCount {
                        chat_id: self.id.clone(),
                        member_count: self.members.len(),
                    });
                }
            }
            ChatKind::Group => {
                if !self
                    .members
                    .iter()
                    .any(|member| member.role == MemberRole::Owner)
                {
                    return Err(ChatContractViolation::GroupWithoutOwner {
                        chat_id: self.id.clone(),
                    });
                }

                if self.title.as_deref().unwrap_or("").is_empty() {
                    return Err(ChatContractViolation::GroupWithoutTitle {
                        chat_id: self.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
