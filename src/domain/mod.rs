//! Domain layer: core entities and synchronization state.

pub mod chat;
pub mod chat_roster;
pub mod events;
pub mod message;
pub mod message_cache;
pub mod presence;
