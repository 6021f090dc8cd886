//! Heartbeat monitor.
//!
//! Armed only while connected. Sends a ping every `interval`; a pong
//! refreshes the liveness timestamp. Once the last liveness update is
//! `2 * interval` old the monitor reports a timeout and the connection is
//! closed without waiting for a lower-level timeout.
//!
//! The monitor owns a single deadline, the earlier of the next ping and the
//! liveness expiry. Disarming clears it, so nothing can fire against a
//! transport that was already torn down.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use super::deadline_after;

// ============================================================================
// HeartbeatTick
// ============================================================================

/// Outcome of polling the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTick {
    /// Nothing due yet.
    Idle,
    /// Time to send a ping.
    Ping,
    /// No pong within twice the interval.
    TimedOut {
        /// Time since the last liveness update.
        elapsed: Duration,
    },
}

// ============================================================================
// HeartbeatMonitor
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Armed {
    last_seen: Instant,
    next_ping: Instant,
}

/// Periodic liveness probe plus timeout detector.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    armed: Option<Armed>,
}

impl HeartbeatMonitor {
    /// Creates a disarmed monitor.
    #[inline]
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            armed: None,
        }
    }

    /// Returns `true` while a deadline is pending.
    #[inline]
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Arms the monitor; the connection counts as alive at `now`.
    pub fn arm(&mut self, now: Instant) {
        self.armed = Some(Armed {
            last_seen: now,
            next_ping: deadline_after(now, self.interval),
        });
    }

    /// Disarms the monitor.
    #[inline]
    pub fn disarm(&mut self) {
        self.armed = None;
    }

    /// Records a pong. Ignored while disarmed.
    pub fn record_pong(&mut self, now: Instant) {
        if let Some(armed) = &mut self.armed {
            armed.last_seen = now;
        }
    }

    /// Returns the next instant the monitor needs to be polled.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.armed
            .map(|armed| armed.next_ping.min(self.expiry(armed.last_seen)))
    }

    /// Advances the monitor to `now`.
    ///
    /// A timeout disarms the monitor. A ping schedules the next one an
    /// interval later.
    pub fn poll(&mut self, now: Instant) -> HeartbeatTick {
        let Some(armed) = &mut self.armed else {
            return HeartbeatTick::Idle;
        };

        let elapsed = now.saturating_duration_since(armed.last_seen);
        if elapsed >= self.interval.saturating_mul(2) {
            self.armed = None;
            return HeartbeatTick::TimedOut { elapsed };
        }

        if now >= armed.next_ping {
            armed.next_ping = deadline_after(now, self.interval);
            return HeartbeatTick::Ping;
        }

        HeartbeatTick::Idle
    }

    fn expiry(&self, last_seen: Instant) -> Instant {
        deadline_after(last_seen, self.interval.saturating_mul(2))
    }
}

// ============================================================================
// Tests
// ============================================================================
