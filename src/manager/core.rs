//! Connection manager facade.
//!
//! The [`ConnectionManager`] is the public face of one logical connection.
//! Every method returns immediately: commands step the state machine under
//! a lock and the event loop performs the resulting IO in the background.
//!
//! # Example
//!
//! ```no_run
//! use ws_lifeline::{ConnectionEvent, ConnectionManager, SendOptions, WebSocketConnector};
//!
//! # async fn example() -> ws_lifeline::Result<()> {
//! let manager = ConnectionManager::builder(WebSocketConnector::new("wss://example.com/live"))
//!     .build()?;
//! let mut events = manager.subscribe();
//!
//! manager.connect();
//! manager.send_message("hello", SendOptions::new().with_id("greeting-1"));
//!
//! while let Some(event) = events.recv().await {
//!     if let ConnectionEvent::Message(payload) = event {
//!         println!("received {payload:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connection::{ConnectionState, EnvironmentSignal, StateMachine, Status};
use crate::error::Result;
use crate::identifiers::SubscriptionId;
use crate::protocol::{Payload, SendOptions};
use crate::transport::Connector;

use super::builder::ManagerBuilder;
use super::driver::Shared;
use super::events::Subscription;

// ============================================================================
// Types
// ============================================================================

/// Internal state owned by all clones of a manager.
pub(crate) struct ManagerInner {
    /// State machine and subscribers, shared with the event loop.
    shared: Arc<Shared>,
    /// Event loop task.
    task: JoinHandle<()>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        debug!("Manager dropped, stopping event loop");
        self.shared.shutdown();
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Resilient duplex connection.
///
/// The manager owns one logical connection: it reconnects with backoff,
/// probes liveness with heartbeats, and buffers messages sent while the
/// connection is down.
///
/// # Thread Safety
///
/// `ConnectionManager` is `Send + Sync` and cheap to clone. All clones
/// control the same connection; it shuts down when the last one drops.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

// ============================================================================
// ConnectionManager - Display
// ============================================================================

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("status", &self.status())
            .field("subscribers", &self.inner.shared.subscribers().lock().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructors
// ============================================================================

impl ConnectionManager {
    /// Creates a configuration builder for a manager using `connector`.
    #[inline]
    #[must_use]
    pub fn builder(connector: impl Connector) -> ManagerBuilder {
        ManagerBuilder::new(connector)
    }

    pub(crate) fn new(shared: Arc<Shared>, task: JoinHandle<()>) -> Self {
        Self {
            inner: Arc::new(ManagerInner { shared, task }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ManagerInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }
}

// ============================================================================
// ConnectionManager - Lifecycle
// ============================================================================

impl ConnectionManager {
    /// Opens the connection.
    ///
    /// Idempotent while connecting or connected. After a manual disconnect
    /// or an exhausted reconnect budget this starts over with a fresh
    /// attempt counter.
    pub fn connect(&self) {
        self.inner.shared.apply(StateMachine::connect);
    }

    /// Closes the connection with a normal-closure code and stops
    /// reconnecting until [`connect()`](Self::connect) is called again.
    ///
    /// Idempotent.
    pub fn disconnect(&self) {
        self.inner.shared.apply(StateMachine::disconnect);
    }

    /// Feeds an environment signal (visibility or network) to the manager.
    pub fn signal(&self, signal: EnvironmentSignal) {
        self.inner
            .shared
            .apply(|machine, now| machine.signal(signal, now));
    }

    /// Reports whether the client is in the foreground.
    #[inline]
    pub fn set_visible(&self, visible: bool) {
        self.signal(if visible {
            EnvironmentSignal::Visible
        } else {
            EnvironmentSignal::Hidden
        });
    }

    /// Reports whether the network is reachable.
    #[inline]
    pub fn set_online(&self, online: bool) {
        self.signal(if online {
            EnvironmentSignal::Online
        } else {
            EnvironmentSignal::Offline
        });
    }
}

// ============================================================================
// ConnectionManager - Messaging
// ============================================================================

impl ConnectionManager {
    /// Sends a message, or queues it while disconnected.
    ///
    /// Returns `true` if the message was handed to the transport now, and
    /// `false` if it was queued or (with `priority`) dropped.
    pub fn send_message(&self, payload: impl Into<Payload>, options: SendOptions) -> bool {
        let payload = payload.into();
        self.inner
            .shared
            .step(|machine, now| machine.send(payload, options, now))
    }

    /// Serializes `value` as JSON and sends it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T, options: SendOptions) -> Result<bool> {
        Ok(self.send_message(Payload::json(value)?, options))
    }
}

// ============================================================================
// ConnectionManager - Observation
// ============================================================================

impl ConnectionManager {
    /// Returns a snapshot of state and counters.
    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.shared.inspect(StateMachine::status)
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.inspect(StateMachine::state)
    }

    /// Registers a new event subscriber.
    ///
    /// Events emitted before this call are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.inner.shared.subscribers().lock().subscribe()
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.shared.subscribers().lock().unsubscribe(id)
    }

    /// Returns `true` while the event loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.inner.task.is_finished()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::sync::mpsc;
    use tokio::time::{Instant, sleep, timeout};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    use crate::error::Error;
    use crate::manager::{ConnectionEvent, DisconnectCause};
    use crate::transport::memory::{MemoryConnector, MemoryPeer, init_logging};

    const WAIT: Duration = Duration::from_secs(3_600);

    struct Harness {
        manager: ConnectionManager,
        connector: MemoryConnector,
        peers: mpsc::UnboundedReceiver<MemoryPeer>,
        events: Subscription,
    }

    impl Harness {
        fn new(configure: impl FnOnce(ManagerBuilder) -> ManagerBuilder) -> Self {
            init_logging();
            let (connector, peers) = MemoryConnector::new();
            let builder = ConnectionManager::builder(connector.clone())
                .max_jitter(Duration::ZERO)
                .heartbeat_enabled(false)
                .jitter_seed(1);
            let manager = configure(builder).build().unwrap();
            let events = manager.subscribe();
            Self {
                manager,
                connector,
                peers,
                events,
            }
        }

        async fn next_event(&mut self) -> ConnectionEvent {
            timeout(WAIT, self.events.recv())
                .await
                .expect("no event")
                .expect("subscription closed")
        }

        /// Skips events until one matches.
        async fn wait_for(&mut self, mut pred: impl FnMut(&ConnectionEvent) -> bool) -> ConnectionEvent {
            loop {
                let event = self.next_event().await;
                if pred(&event) {
                    return event;
                }
            }
        }

        async fn connected(&mut self) -> MemoryPeer {
            self.manager.connect();
            let peer = timeout(WAIT, self.peers.recv()).await.unwrap().unwrap();
            self.wait_for(|e| matches!(e, ConnectionEvent::Connected)).await;
            peer
        }
    }

    async fn read_text(peer: &mut MemoryPeer) -> String {
        match timeout(WAIT, peer.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_opens_and_reports() {
        let mut h = Harness::new(|b| b);
        let _peer = h.connected().await;

        let status = h.manager.status();
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.reconnect_attempts, 0);

        h.manager.connect();
        assert_eq!(h.connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_connected_writes_once() {
        let mut h = Harness::new(|b| b);
        let mut peer = h.connected().await;

        assert!(h.manager.send_message("hello", SendOptions::new()));
        assert_eq!(read_text(&mut peer).await, "hello");

        assert!(h.manager.send_json(&serde_json::json!({"n": 1}), SendOptions::new()).unwrap());
        assert_eq!(read_text(&mut peer).await, r#"{"n":1}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_messages_flushed_in_order() {
        let mut h = Harness::new(|b| b);
        for text in ["a", "b", "c"] {
            assert!(!h.manager.send_message(text, SendOptions::new()));
        }
        assert_eq!(h.manager.status().queued_count, 3);

        let mut peer = h.connected().await;
        for expected in ["a", "b", "c"] {
            assert_eq!(read_text(&mut peer).await, expected);
        }
        assert_eq!(h.manager.status().queued_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_message_discarded_while_disconnected() {
        let h = Harness::new(|b| b);
        let sent = h
            .manager
            .send_message("hello", SendOptions::new().with_priority());
        assert!(!sent);
        assert_eq!(h.manager.status().queued_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_frames_are_not_delivered() {
        let mut h = Harness::new(|b| b);
        let mut peer = h.connected().await;

        assert!(h.manager.send_message("x", SendOptions::new().with_id("m-1")));
        assert_eq!(h.manager.status().pending_ack_count, 1);
        read_text(&mut peer).await;

        peer.send(Message::text(r#"{"type":"pong","timestamp":1}"#))
            .await
            .unwrap();
        peer.send(Message::text(r#"{"type":"ack","messageId":"m-1"}"#))
            .await
            .unwrap();
        peer.send(Message::text("after")).await.unwrap();

        let event = h
            .wait_for(|e| matches!(e, ConnectionEvent::Acknowledged(_) | ConnectionEvent::Message(_)))
            .await;
        assert!(matches!(event, ConnectionEvent::Acknowledged(id) if id.as_str() == "m-1"));

        let event = h.next_event().await;
        assert!(matches!(event, ConnectionEvent::Message(Payload::Text(text)) if text == "after"));
        assert_eq!(h.manager.status().pending_ack_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_ping_answered() {
        let mut h = Harness::new(|b| b);
        let mut peer = h.connected().await;

        peer.send(Message::text(r#"{"type":"ping","timestamp":77}"#))
            .await
            .unwrap();
        assert_eq!(
            read_text(&mut peer).await,
            r#"{"type":"pong","timestamp":77}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_timeout_forces_close() {
        let mut h = Harness::new(|b| {
            b.heartbeat_enabled(true)
                .heartbeat_interval(Duration::from_millis(1_000))
        });
        let mut peer = h.connected().await;
        let opened_at = Instant::now();

        let ping = read_text(&mut peer).await;
        assert!(ping.starts_with(r#"{"type":"ping""#));

        h.wait_for(|e| {
            matches!(
                e,
                ConnectionEvent::Disconnected {
                    cause: DisconnectCause::HeartbeatTimeout,
                    ..
                }
            )
        })
        .await;
        let elapsed = opened_at.elapsed();
        assert!(elapsed >= Duration::from_millis(2_000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(2_100), "{elapsed:?}");

        match timeout(WAIT, peer.next()).await.unwrap() {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), 4000);
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_until_exhausted() {
        let mut h = Harness::new(|b| {
            b.max_reconnect_attempts(3)
                .base_reconnect_interval(Duration::from_millis(100))
                .backoff_growth_factor(2.0)
        });
        let peer = h.connected().await;

        h.connector.set_refusing(true);
        drop(peer);

        let mut closed_at = None;
        let mut delays = Vec::new();
        loop {
            match h.next_event().await {
                ConnectionEvent::Disconnected {
                    cause: DisconnectCause::MaxAttemptsExceeded,
                    ..
                } => break,
                ConnectionEvent::Disconnected { code, .. } => {
                    assert_eq!(code, 1006);
                    closed_at = Some(Instant::now());
                }
                ConnectionEvent::StateChanged {
                    to: ConnectionState::Connecting,
                    ..
                } => {
                    let closed_at = closed_at.take().expect("attempt without close");
                    delays.push(closed_at.elapsed());
                }
                _ => {}
            }
        }

        assert_eq!(delays.len(), 3);
        for (delay, expected) in delays.iter().zip([100, 200, 400]) {
            let expected = Duration::from_millis(expected);
            assert!(*delay >= expected, "{delay:?} < {expected:?}");
            assert!(*delay < expected + Duration::from_millis(5), "{delay:?}");
        }
        let status = h.manager.status();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.reconnect_attempts, 3);
        assert_eq!(h.connector.attempts(), 4);

        // Terminal: nothing else happens.
        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.connector.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_holds_reconnect_until_visible() {
        let mut h = Harness::new(|b| b.base_reconnect_interval(Duration::from_millis(100)));
        let peer = h.connected().await;

        drop(peer);
        h.wait_for(|e| matches!(e, ConnectionEvent::Disconnected { .. }))
            .await;
        assert_eq!(h.manager.status().reconnect_attempts, 1);

        h.manager.set_visible(false);
        sleep(Duration::from_secs(600)).await;
        assert_eq!(h.connector.attempts(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Reconnecting);

        h.manager.set_visible(true);
        let status = h.manager.status();
        assert_eq!(status.state, ConnectionState::Connecting);
        assert_eq!(status.reconnect_attempts, 0);

        let _peer = timeout(WAIT, h.peers.recv()).await.unwrap().unwrap();
        assert_eq!(h.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_sends_normal_closure() {
        let mut h = Harness::new(|b| b);
        let mut peer = h.connected().await;

        h.manager.disconnect();
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);

        let event = h
            .wait_for(|e| matches!(e, ConnectionEvent::Disconnected { .. }))
            .await;
        assert!(matches!(
            event,
            ConnectionEvent::Disconnected {
                code: 1000,
                cause: DisconnectCause::Manual,
                ..
            }
        ));

        match timeout(WAIT, peer.next()).await.unwrap() {
            Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("expected close frame, got {other:?}"),
        }

        h.manager.set_online(true);
        h.manager.set_visible(true);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_construction_failure_stops() {
        let mut h = Harness::new(|b| b);
        h.connector.set_broken(true);
        h.manager.connect();

        let event = h
            .wait_for(|e| matches!(e, ConnectionEvent::Error(_)))
            .await;
        let ConnectionEvent::Error(error) = event else {
            unreachable!();
        };
        assert!(matches!(*error, Error::TransportConstruction { .. }));

        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        assert_eq!(h.connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_ends_stream() {
        let mut h = Harness::new(|b| b);
        let id = h.events.id;

        assert!(h.manager.unsubscribe(id));
        assert!(!h.manager.unsubscribe(id));
        assert!(h.events.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_closes_transport() {
        let mut h = Harness::new(|b| b);
        let mut peer = h.connected().await;

        drop(h.manager);

        match timeout(WAIT, peer.next()).await.unwrap() {
            Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}
