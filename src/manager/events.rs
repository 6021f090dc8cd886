//! Connection events and the subscriber registry.
//!
//! Events are produced by the state machine in the same step as the state
//! change they describe and delivered in that order, at most once per
//! subscriber.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::connection::ConnectionState;
use crate::error::Error;
use crate::identifiers::{MessageId, SubscriptionId};
use crate::protocol::Payload;

// ============================================================================
// DisconnectCause
// ============================================================================

/// Why a connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectCause {
    /// Transport closed or failed (peer close, network error, refused).
    Remote,
    /// No pong within twice the heartbeat interval.
    HeartbeatTimeout,
    /// `disconnect()` was called.
    Manual,
    /// Reconnect budget exhausted; terminal until `connect()`.
    MaxAttemptsExceeded,
}

impl DisconnectCause {
    /// Returns `true` if the manager will try to reconnect on its own.
    #[inline]
    #[must_use]
    pub const fn will_reconnect(self) -> bool {
        matches!(self, Self::Remote | Self::HeartbeatTimeout)
    }
}

// ============================================================================
// ConnectionEvent
// ============================================================================

/// Observable event emitted by the manager.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Lifecycle state changed.
    StateChanged {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
    },

    /// Transport opened.
    Connected,

    /// Transport went away.
    Disconnected {
        /// Close code (1000 normal, 1006 abnormal, 4000 heartbeat timeout).
        code: u16,
        /// Close reason text.
        reason: String,
        /// Classification of the close.
        cause: DisconnectCause,
    },

    /// Application message (control frames are never delivered).
    Message(Payload),

    /// The peer acknowledged a tracked message.
    Acknowledged(MessageId),

    /// A failure that was recovered locally.
    Error(Arc<Error>),
}

impl ConnectionEvent {
    /// Wraps an error into an event.
    #[inline]
    #[must_use]
    pub fn error(error: Error) -> Self {
        Self::Error(Arc::new(error))
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Receiving end of an event subscription.
///
/// Dropping the receiver is enough to unsubscribe; the registry prunes it on
/// the next dispatch.
#[derive(Debug)]
pub struct Subscription {
    /// Handle for `ConnectionManager::unsubscribe`.
    pub id: SubscriptionId,
    /// Event stream, in emission order.
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Subscription {
    /// Waits for the next event.
    ///
    /// Returns `None` once the manager is gone or the subscription removed.
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    /// Returns the next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<ConnectionEvent> {
        self.events.try_recv().ok()
    }
}

// ============================================================================
// Subscribers
// ============================================================================

/// Registry of event subscribers.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    senders: FxHashMap<SubscriptionId, mpsc::UnboundedSender<ConnectionEvent>>,
}

impl Subscribers {
    /// Registers a new subscriber.
    pub fn subscribe(&mut self) -> Subscription {
        self.next_id += 1;
        let id = SubscriptionId::new(self.next_id);
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(id, tx);

        trace!(%id, "Subscriber added");
        Subscription { id, events: rx }
    }

    /// Removes a subscriber. Returns `false` if it was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.senders.remove(&id).is_some()
    }

    /// Delivers an event to every live subscriber.
    pub fn dispatch(&mut self, event: &ConnectionEvent) {
        self.senders.retain(|id, tx| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                trace!(%id, "Pruned closed subscriber");
            }
            alive
        });
    }

    /// Returns the number of live subscribers.
    #[inline]
    pub fn len(&self) -> usize {
        self.senders.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_reaches_every_subscriber() {
        let mut subscribers = Subscribers::default();
        let mut first = subscribers.subscribe();
        let mut second = subscribers.subscribe();
        assert_ne!(first.id, second.id);

        subscribers.dispatch(&ConnectionEvent::Connected);

        assert!(matches!(first.try_recv(), Some(ConnectionEvent::Connected)));
        assert!(matches!(second.try_recv(), Some(ConnectionEvent::Connected)));
        assert!(first.try_recv().is_none());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut subscribers = Subscribers::default();
        let mut sub = subscribers.subscribe();

        assert!(subscribers.unsubscribe(sub.id));
        assert!(!subscribers.unsubscribe(sub.id));

        subscribers.dispatch(&ConnectionEvent::Connected);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let mut subscribers = Subscribers::default();
        let sub = subscribers.subscribe();
        let _kept = subscribers.subscribe();
        drop(sub);

        subscribers.dispatch(&ConnectionEvent::Connected);
        assert_eq!(subscribers.len(), 1);
    }

    #[test]
    fn test_will_reconnect() {
        assert!(DisconnectCause::Remote.will_reconnect());
        assert!(DisconnectCause::HeartbeatTimeout.will_reconnect());
        assert!(!DisconnectCause::Manual.will_reconnect());
        assert!(!DisconnectCause::MaxAttemptsExceeded.will_reconnect());
    }
}
