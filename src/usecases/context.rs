//! The synchronization context: one authenticated session's worth of state.
//!
//! Owns the message cache, the conversation roster, and presence, plus the
//! live connection feeding them. The context is handed to consumers
//! explicitly; nothing here lives in ambient global scope. Its state is
//! cleared synchronously on sign-out or identity switch, and the connection
//! generation guard keeps events of a superseded connection out of the next
//! session's state.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::{
    domain::{
        chat::{Chat, ChatMember},
        chat_roster::ChatRoster,
        message::Message,
        message_cache::MessageCache,
        presence::PresenceTracker,
    },
    net::{
        backoff::ReconnectPolicy,
        connection::{ConnectionManager, ConnectionPhase, EventSink},
        envelope::{self, OutboundFrame},
    },
    usecases::{
        create_chat::{self, ChatCreator, CreateChatError, CreateChatRequest},
        list_chats::{self, ChatDirectory, ListChatsError, ListChatsQuery},
        list_members::{self, ListMembersError, MembersSource},
        load_history::{
            self, HistorySource, LoadHistoryError, LoadHistoryOutcome, LoadHistoryQuery,
        },
        send_message::{submit_message, SubmitCommand, SubmitError},
    },
};

const SESSION_MESSAGE_MERGED: &str = "SESSION_MESSAGE_MERGED";

#[derive(Debug, Default)]
struct SyncState {
    cache: MessageCache,
    roster: ChatRoster,
    presence: PresenceTracker,
    /// Set when the connection reopens; consumed by `resync_if_needed`.
    resync_pending: bool,
}

impl SyncState {
    fn clear(&mut self) {
        self.cache.clear();
        self.roster.clear();
        self.presence.clear();
        self.resync_pending = false;
    }
}

/// Routes decoded connection events into the shared state.
struct StateSink {
    state: Arc<Mutex<SyncState>>,
}

impl EventSink for StateSink {
    fn on_message(&self, message: Message) {
        if let Ok(mut state) = self.state.lock() {
            let chat_id = message.chat_id.clone();
            let activity_at = message.created_at;
            tracing::debug!(
                code = SESSION_MESSAGE_MERGED,
                chat_id = %chat_id,
                message_id = %message.id,
                "merging server-confirmed message"
            );
            state.cache.merge(&chat_id, message);
            state.roster.touch(&chat_id, activity_at);
        }
    }

    fn on_presence_change(&self, user_id: &str, online: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.presence.set_online(user_id, online);
        }
    }

    fn on_typing(&self, chat_id: &str, user_id: &str, is_typing: bool) {
        if let Ok(mut state) = self.state.lock() {
            if is_typing {
                state.presence.record_typing(chat_id, user_id, Utc::now());
            } else {
                state.presence.clear_typing(chat_id, user_id);
            }
        }
    }

    fn on_chat_update(&self, chat: Chat) {
        if let Ok(mut state) = self.state.lock() {
            state.roster.upsert(chat);
        }
    }

    fn on_resync_required(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.resync_pending = true;
        }
    }
}

/// One authenticated session's synchronization core.
pub struct SessionContext {
    identity: Mutex<Option<String>>,
    state: Arc<Mutex<SyncState>>,
    connection: ConnectionManager,
}

impl SessionContext {
    pub fn new(server_url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let state = Arc::new(Mutex::new(SyncState::default()));
        let sink = Arc::new(StateSink {
            state: Arc::clone(&state),
        });
        let connection = ConnectionManager::new(server_url, policy, sink);

        Self {
            identity: Mutex::new(None),
            state,
            connection,
        }
    }

    pub fn identity(&self) -> Option<String> {
        self.identity
            .lock()
            .map(|identity| identity.clone())
            .unwrap_or(None)
    }

    /// Starts a session for `identity`. Switching from another identity
    /// first tears the previous session down completely, so no event or
    /// cache entry of the old identity can leak into the new one.
    pub fn sign_in(&self, identity: &str) {
        let identity = identity.trim();
        if identity.is_empty() {
            return;
        }

        if self.identity().as_deref() != Some(identity) {
            self.teardown();
        }

        if let Ok(mut current) = self.identity.lock() {
            *current = Some(identity.to_owned());
        }
        self.connection.connect(identity);
    }

    /// Disconnects and clears all session state. Idempotent.
    pub fn sign_out(&self) {
        self.teardown();
        if let Ok(mut current) = self.identity.lock() {
            *current = None;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection_phase(&self) -> ConnectionPhase {
        self.connection.phase()
    }

    /// Submits a message. The cache is left alone: it changes only when the
    /// server echoes the confirmed message back through the inbound path.
    pub fn submit(&self, command: SubmitCommand) -> Result<(), SubmitError> {
        submit_message(&self.connection, command)
    }

    /// Signals typing state; returns `false` when not connected.
    pub fn send_typing(&self, chat_id: &str, is_typing: bool) -> bool {
        let raw = envelope::encode(&OutboundFrame::Typing {
            chat_id: chat_id.to_owned(),
            is_typing,
        });
        self.connection.send(raw)
    }

    /// Reports messages as read; returns `false` when not connected.
    pub fn send_read_receipt(&self, chat_id: &str, message_ids: Vec<String>) -> bool {
        let raw = envelope::encode(&OutboundFrame::ReadReceipt {
            chat_id: chat_id.to_owned(),
            message_ids,
        });
        self.connection.send(raw)
    }

    /// Opens a conversation: marks it active and populates its history on
    /// first visit. Later visits are served from the cache.
    pub fn open_chat(
        &self,
        source: &dyn HistorySource,
        chat_id: &str,
    ) -> Result<LoadHistoryOutcome, LoadHistoryError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(LoadHistoryError::TemporarilyUnavailable);
        };

        state.roster.set_active(chat_id);
        let state = &mut *state;
        load_history::load_history(source, &mut state.cache, LoadHistoryQuery::new(chat_id))
    }

    /// Replaces the roster from the conversation directory.
    pub fn refresh_chat_list(
        &self,
        directory: &dyn ChatDirectory,
    ) -> Result<usize, ListChatsError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(ListChatsError::TemporarilyUnavailable);
        };

        let state = &mut *state;
        list_chats::load_chat_list(directory, &mut state.roster, ListChatsQuery::default())
    }

    pub fn members(
        &self,
        source: &dyn MembersSource,
        chat_id: &str,
    ) -> Result<Vec<ChatMember>, ListMembersError> {
        list_members::list_members(source, chat_id)
    }

    /// Creates a conversation through the collaborator and folds it into
    /// this session's list.
    pub fn create_chat(
        &self,
        creator: &dyn ChatCreator,
        request: CreateChatRequest,
    ) -> Result<Chat, CreateChatError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(CreateChatError::TemporarilyUnavailable);
        };

        let state = &mut *state;
        create_chat::create_chat(creator, &mut state.roster, request)
    }

    /// After a reconnect, re-fetches the active conversation's recent
    /// history once to cover any delivery gap. Returns `true` when a
    /// resync actually ran.
    pub fn resync_if_needed(&self, source: &dyn HistorySource) -> Result<bool, LoadHistoryError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(LoadHistoryError::TemporarilyUnavailable);
        };

        if !state.resync_pending {
            return Ok(false);
        }
        state.resync_pending = false;

        let Some(chat_id) = state.roster.active_chat().map(|chat| chat.id.clone()) else {
            return Ok(false);
        };

        let state = &mut *state;
        load_history::refetch_history(source, &mut state.cache, LoadHistoryQuery::new(&chat_id))?;
        Ok(true)
    }

    /// Snapshot of the cached messages for a conversation.
    pub fn messages(&self, chat_id: &str) -> Vec<Message> {
        self.state
            .lock()
            .map(|state| state.cache.get(chat_id).to_vec())
            .unwrap_or_default()
    }

    /// Snapshot of the ordered conversation list.
    pub fn chats(&self) -> Vec<Chat> {
        self.state
            .lock()
            .map(|state| state.roster.chats().to_vec())
            .unwrap_or_default()
    }

    pub fn active_chat(&self) -> Option<Chat> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.roster.active_chat().cloned())
    }

    /// Users currently typing in a conversation, expired entries pruned.
    pub fn typing_users(&self, chat_id: &str) -> Vec<String> {
        let now = Utc::now();
        self.state
            .lock()
            .map(|mut state| {
                state.presence.expire_typing(now);
                state.presence.typing_users(chat_id, now)
            })
            .unwrap_or_default()
    }

    pub fn is_online(&self, user_id: &str) -> Option<bool> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.presence.is_online(user_id))
    }

    fn teardown(&self) {
        self.connection.disconnect();
        if let Ok(mut state) = self.state.lock() {
            state.clear();
        }
    }
}
