//! Headless synchronization core for a real-time IM chat client.
//!
//! The crate keeps a client's conversation list, per-conversation message
//! history, and presence in sync with a chat server over a WebSocket
//! connection. Front ends embed [`usecases::context::SessionContext`] and
//! read snapshots from it; all server traffic flows through the connection
//! manager and the envelope codec.

pub mod domain;
pub mod infra;
pub mod net;
pub mod usecases;
