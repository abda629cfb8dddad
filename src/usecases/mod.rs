pub mod context;
pub mod create_chat;
pub mod list_chats;
pub mod list_members;
pub mod load_history;
pub mod send_message;
