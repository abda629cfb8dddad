//! Lifecycle of the live server connection.
//!
//! One connection exists per active identity. Every `connect` starts a new
//! connection generation; inbound dispatch and the outbound channel are both
//! tied to the generation they were created under, so events from a
//! superseded connection are discarded instead of leaking into the state of
//! a later session.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::domain::{chat::Chat, events::ServerEvent, message::Message};

use super::{
    backoff::{Backoff, ReconnectPolicy},
    envelope,
};

const CONNECT_WITHOUT_IDENTITY: &str = "CONNECTION_CONNECT_WITHOUT_IDENTITY";
const CONNECTION_OPENED: &str = "CONNECTION_OPENED";
const CONNECTION_OPEN_FAILED: &str = "CONNECTION_OPEN_FAILED";
const CONNECTION_CLOSED_BY_SERVER: &str = "CONNECTION_CLOSED_BY_SERVER";
const CONNECTION_READ_FAILED: &str = "CONNECTION_READ_FAILED";
const CONNECTION_RETRY_SCHEDULED: &str = "CONNECTION_RETRY_SCHEDULED";
const CONNECTION_FRAME_DROPPED: &str = "CONNECTION_FRAME_DROPPED";
const CONNECTION_STALE_EVENT_DISCARDED: &str = "CONNECTION_STALE_EVENT_DISCARDED";

/// Callbacks invoked by the inbound dispatch loop.
pub trait EventSink: Send + Sync {
    fn on_message(&self, message: Message);
    fn on_presence_change(&self, user_id: &str, online: bool);
    fn on_chat_update(&self, chat: Chat);

    fn on_typing(&self, _chat_id: &str, _user_id: &str, _is_typing: bool) {}

    /// Invoked after every successful open, including reopens after a drop.
    /// Owners re-fetch recent history here to cover any delivery gap.
    fn on_resync_required(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

#[derive(Default)]
struct Shared {
    phase: Mutex<ConnectionPhase>,
    generation: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Wakes the connection task out of a blocking read or a backoff sleep
    /// when its generation has been superseded.
    shutdown: Notify,
}

impl Shared {
    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.current_generation() != generation
    }

    fn phase(&self) -> ConnectionPhase {
        self.phase
            .lock()
            .map(|phase| *phase)
            .unwrap_or(ConnectionPhase::Closed)
    }

    fn set_phase(&self, next: ConnectionPhase) {
        if let Ok(mut phase) = self.phase.lock() {
            *phase = next;
        }
    }

    fn set_phase_if_current(&self, generation: u64, next: ConnectionPhase) {
        if !self.is_stale(generation) {
            self.set_phase(next);
        }
    }

    fn install_outbound(&self, generation: u64, tx: mpsc::UnboundedSender<String>) {
        if self.is_stale(generation) {
            return;
        }
        if let Ok(mut outbound) = self.outbound.lock() {
            *outbound = Some(tx);
        }
    }

    fn clear_outbound(&self, generation: u64) {
        if self.is_stale(generation) {
            return;
        }
        if let Ok(mut outbound) = self.outbound.lock() {
            *outbound = None;
        }
    }
}

/// Owns the live connection to the chat server.
pub struct ConnectionManager {
    server_url: String,
    policy: ReconnectPolicy,
    sink: Arc<dyn EventSink>,
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        server_url: impl Into<String>,
        policy: ReconnectPolicy,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            policy,
            sink,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Opens a connection scoped to `identity`. No-op when the identity is
    /// empty: a connection must not exist without an authenticated identity.
    ///
    /// Calling this again supersedes any previous connection; its in-flight
    /// events are discarded. Must run inside a tokio runtime.
    pub fn connect(&self, identity: &str) {
        let identity = identity.trim();
        if identity.is_empty() {
            tracing::warn!(
                code = CONNECT_WITHOUT_IDENTITY,
                "refusing to connect without an identity"
            );
            return;
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut outbound) = self.shared.outbound.lock() {
            *outbound = None;
        }
        self.shared.shutdown.notify_waiters();
        self.shared.set_phase(ConnectionPhase::Connecting);

        let endpoint = format!("{}?userId={}", self.server_url, identity);
        tokio::spawn(run_connection(
            endpoint,
            generation,
            Arc::clone(&self.shared),
            Arc::clone(&self.sink),
            self.policy,
        ));
    }

    /// Closes the active connection. Idempotent; any event still in flight
    /// on the old connection is discarded by the generation guard.
    ///
    /// Dropping the outbound sender ends the writer task, which performs the
    /// close handshake, and the shutdown signal wakes the connection task so
    /// the socket is released immediately rather than on the next frame.
    pub fn disconnect(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut outbound) = self.shared.outbound.lock() {
            *outbound = None;
        }
        self.shared.shutdown.notify_waiters();
        self.shared.set_phase(ConnectionPhase::Closed);
    }

    /// True only between a successful open and the following close or error.
    pub fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Open
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.shared.phase()
    }

    /// Queues one raw frame for transmission. Returns `false` instead of
    /// failing when the connection is not open; the caller surfaces that.
    pub fn send(&self, raw: String) -> bool {
        if !self.is_connected() {
            return false;
        }

        if let Ok(outbound) = self.shared.outbound.lock() {
            if let Some(tx) = outbound.as_ref() {
                return tx.send(raw).is_ok();
            }
        }

        false
    }
}

async fn run_connection(
    endpoint: String,
    generation: u64,
    shared: Arc<Shared>,
    sink: Arc<dyn EventSink>,
    policy: ReconnectPolicy,
) {
    let mut backoff = Backoff::new(policy);

    loop {
        if shared.is_stale(generation) {
            return;
        }

        match connect_async(&endpoint).await {
            Ok((stream, _response)) => {
                if shared.is_stale(generation) {
                    return;
                }

                backoff.reset();
                let (mut write, mut read) = stream.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                shared.install_outbound(generation, tx);
                shared.set_phase_if_current(generation, ConnectionPhase::Open);
                tracing::info!(code = CONNECTION_OPENED, generation, "live connection open");
                sink.on_resync_required();

                // The writer owns the write half; once the outbound sender
                // is dropped it runs the close handshake, so the server sees
                // an orderly close instead of an abandoned socket.
                let writer = tokio::spawn(async move {
                    while let Some(raw) = rx.recv().await {
                        if write.send(WsMessage::Text(raw)).await.is_err() {
                            break;
                        }
                    }
                    let _ = write.close().await;
                });

                loop {
                    let frame = tokio::select! {
                        _ = shared.shutdown.notified() => break,
                        frame = read.next() => match frame {
                            Some(frame) => frame,
                            None => break,
                        },
                    };

                    if shared.is_stale(generation) {
                        tracing::debug!(
                            code = CONNECTION_STALE_EVENT_DISCARDED,
                            generation,
                            "discarding event from superseded connection"
                        );
                        break;
                    }

                    match frame {
                        Ok(WsMessage::Text(raw)) => dispatch_frame(&raw, sink.as_ref()),
                        Ok(WsMessage::Close(_)) => {
                            tracing::info!(
                                code = CONNECTION_CLOSED_BY_SERVER,
                                generation,
                                "server closed the connection"
                            );
                            break;
                        }
                        Ok(_) => {} // ping/pong/binary carry no events
                        Err(error) => {
                            tracing::warn!(
                                code = CONNECTION_READ_FAILED,
                                generation,
                                error = %error,
                                "connection read failed"
                            );
                            break;
                        }
                    }
                }

                // Releases the last outbound sender (the manager already
                // dropped its copy on disconnect/supersede), then waits for
                // the writer to finish the close handshake.
                shared.clear_outbound(generation);
                let _ = writer.await;
            }
            Err(error) => {
                tracing::warn!(
                    code = CONNECTION_OPEN_FAILED,
                    generation,
                    error = %error,
                    "connection open failed"
                );
            }
        }

        if shared.is_stale(generation) {
            return;
        }

        shared.set_phase_if_current(generation, ConnectionPhase::Reconnecting);
        let delay = backoff.next_delay();
        tracing::info!(
            code = CONNECTION_RETRY_SCHEDULED,
            generation,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        tokio::select! {
            _ = shared.shutdown.notified() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Decodes one inbound frame and routes it to the sink. Malformed frames are
/// logged and dropped; they never tear down the dispatch loop.
pub fn dispatch_frame(raw: &str, sink: &dyn EventSink) {
    match envelope::decode(raw) {
        Ok(ServerEvent::ChatMessage(message)) => sink.on_message(message),
        Ok(ServerEvent::PresenceChange { user_id, online }) => {
            sink.on_presence_change(&user_id, online)
        }
        Ok(ServerEvent::Typing {
            chat_id,
            user_id,
            is_typing,
        }) => sink.on_typing(&chat_id, &user_id, is_typing),
        Ok(ServerEvent::ChatUpdate(chat)) => sink.on_chat_update(chat),
        Err(error) => {
            tracing::warn!(
                code = CONNECTION_FRAME_DROPPED,
                error = %error,
                "malformed inbound frame dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: StdMutex<Vec<Message>>,
        presence: StdMutex<Vec<(String, bool)>>,
        chats: StdMutex<Vec<Chat>>,
        resyncs: StdMutex<usize>,
    }

    impl EventSink for RecordingSink {
        fn on_message(&self, message: Message) {
            self.messages.lock().expect("messages lock").push(message);
        }

        fn on_presence_change(&self, user_id: &str, online: bool) {
            self.presence
                .lock()
                .expect("presence lock")
                .push((user_id.to_owned(), online));
        }

        fn on_chat_update(&self, chat: Chat) {
            self.chats.lock().expect("chats lock").push(chat);
        }

        fn on_resync_required(&self) {
            *self.resyncs.lock().expect("resyncs lock") += 1;
        }
    }

    #[test]
    fn dispatch_routes_message_frames_to_sink() {
        let sink = RecordingSink::default();
        let raw = r#"{
            "id": "m1",
            "chatId": "c1",
            "senderId": "u1",
            "type": "text",
            "content": { "text": "hi" },
            "createdAt": "2024-01-01T09:59:00Z"
        }"#;

        dispatch_frame(raw, &sink);

        let messages = sink.messages.lock().expect("messages lock");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
    }

    #[test]
    fn dispatch_routes_presence_frames_to_sink() {
        let sink = RecordingSink::default();

        dispatch_frame(r#"{ "type": "presence", "userId": "u9", "online": false }"#, &sink);

        let presence = sink.presence.lock().expect("presence lock");
        assert_eq!(presence.as_slice(), &[("u9".to_owned(), false)]);
    }

    #[test]
    fn dispatch_drops_malformed_frames_without_panicking() {
        let sink = RecordingSink::default();

        dispatch_frame("{not json", &sink);
        dispatch_frame(r#"{ "type": "telemetry" }"#, &sink);
        dispatch_frame(
            r#"{ "id": "m1", "chatId": "c1", "senderId": "u1", "type": "text",
                 "content": { "fileId": "f1" }, "createdAt": "2024-01-01T09:59:00Z" }"#,
            &sink,
        );

        assert!(sink.messages.lock().expect("messages lock").is_empty());
        assert!(sink.presence.lock().expect("presence lock").is_empty());
        assert!(sink.chats.lock().expect("chats lock").is_empty());
    }

    #[tokio::test]
    async fn send_is_refused_before_any_connection_exists() {
        let manager = ConnectionManager::new(
            "ws://127.0.0.1:1/ws",
            ReconnectPolicy::default(),
            Arc::new(RecordingSink::default()),
        );

        assert_eq!(manager.phase(), ConnectionPhase::Idle);
        assert!(!manager.is_connected());
        assert!(!manager.send("{}".to_owned()));
    }

    #[tokio::test]
    async fn connect_with_empty_identity_is_a_no_op() {
        let manager = ConnectionManager::new(
            "ws://127.0.0.1:1/ws",
            ReconnectPolicy::default(),
            Arc::new(RecordingSink::default()),
        );

        manager.connect("   ");

        assert_eq!(manager.phase(), ConnectionPhase::Idle);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let manager = ConnectionManager::new(
            "ws://127.0.0.1:1/ws",
            ReconnectPolicy::default(),
            Arc::new(RecordingSink::default()),
        );

        manager.disconnect();
        manager.disconnect();

        assert_eq!(manager.phase(), ConnectionPhase::Closed);
        assert!(!manager.send("{}".to_owned()));
    }
}
