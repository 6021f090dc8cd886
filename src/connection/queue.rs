//! Outbound queue for messages sent while disconnected.
//!
//! Bounded in two ways:
//!
//! - **Age**: entries older than the TTL are evicted on every push and
//!   skipped on flush.
//! - **Size**: pushing past capacity truncates the queue to its newest
//!   `capacity / 2` entries (at least one).
//!
//! The queue is the only owner of [`QueuedMessage`] values.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::identifiers::MessageId;
use crate::protocol::Payload;

// ============================================================================
// QueuedMessage
// ============================================================================

/// A message waiting for the next connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Message content.
    pub payload: Payload,
    /// Optional acknowledgment id.
    pub id: Option<MessageId>,
    /// When the message was queued.
    pub enqueued_at: Instant,
}

// ============================================================================
// OutboundQueue
// ============================================================================

/// FIFO buffer with TTL and capacity eviction.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    entries: VecDeque<QueuedMessage>,
    capacity: usize,
    ttl: Duration,
}

impl OutboundQueue {
    /// Creates an empty queue.
    ///
    /// `capacity` is clamped to at least 1.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1_024)),
            capacity,
            ttl,
        }
    }

    /// Returns the number of queued messages.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the configured capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a message, evicting expired and overflowing entries.
    pub fn push(&mut self, payload: Payload, id: Option<MessageId>, now: Instant) {
        self.evict_expired(now);

        self.entries.push_back(QueuedMessage {
            payload,
            id,
            enqueued_at: now,
        });

        if self.entries.len() > self.capacity {
            let keep = (self.capacity / 2).max(1);
            let dropped = self.entries.len() - keep;
            self.entries.drain(..dropped);
            debug!(dropped, kept = keep, "Outbound queue over capacity, dropped oldest");
        }
    }

    /// Removes entries older than the TTL.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|entry| now.saturating_duration_since(entry.enqueued_at) < ttl);

        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted expired queued messages");
        }
        evicted
    }

    /// Drains every unexpired entry in enqueue order.
    pub fn drain_live(&mut self, now: Instant) -> Vec<QueuedMessage> {
        self.evict_expired(now);
        self.entries.drain(..).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
