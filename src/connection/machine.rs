//! Connection state machine.
//!
//! A sans-IO core: every input (caller command, transport callback, timer,
//! environment signal) is a method taking the current time, and every side
//! effect comes back as an [`Action`] for the event loop to execute in order.
//! The machine never blocks and never touches a socket, which makes every
//! timing rule testable with plain [`Instant`] arithmetic.
//!
//! # Timers
//!
//! Timers are deadlines held in `Option`s, so there is at most one pending
//! reconnect timer and at most one heartbeat timer by construction. Both are
//! cleared in the same step that changes state.
//!
//! # Transport ownership
//!
//! Each attempt is tagged with a fresh [`Generation`]. The event loop holds
//! the one live handle; inputs carrying an older generation are ignored.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::identifiers::{Generation, MessageId};
use crate::manager::{ConnectionEvent, DisconnectCause, ManagerConfig};
use crate::protocol::{ControlFrame, Inbound, Payload, SendOptions};

use super::backoff::BackoffPolicy;
use super::deadline_after;
use super::environment::{EnvironmentSignal, SignalOutcome, Suspension};
use super::heartbeat::{HeartbeatMonitor, HeartbeatTick};
use super::queue::OutboundQueue;
use super::state::ConnectionState;

// ============================================================================
// Constants
// ============================================================================

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Abnormal closure: no close frame, connection failed or dropped.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Application code used when the heartbeat times out.
pub const CLOSE_HEARTBEAT_TIMEOUT: u16 = 4000;

const REASON_MANUAL: &str = "normal closure";
const REASON_HEARTBEAT: &str = "heartbeat timeout";

// ============================================================================
// Action
// ============================================================================

/// Side effect requested by the state machine.
#[derive(Debug, Clone)]
pub enum Action {
    /// Release any current transport and start a new attempt.
    Open(Generation),

    /// Write a payload to the transport of `generation`.
    Write {
        /// Transport the write is meant for.
        generation: Generation,
        /// Frame content.
        payload: Payload,
    },

    /// Close the transport of `generation` (or abandon its pending attempt).
    Close {
        /// Transport to close.
        generation: Generation,
        /// Close code to send.
        code: u16,
        /// Close reason to send.
        reason: String,
    },

    /// Deliver an event to subscribers.
    Emit(ConnectionEvent),
}

// ============================================================================
// Status
// ============================================================================

/// Read-only snapshot of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Consecutive failed reconnects since the last successful open.
    pub reconnect_attempts: u32,
    /// Messages waiting in the outbound queue.
    pub queued_count: usize,
    /// Tracked ids not yet acknowledged.
    pub pending_ack_count: usize,
}

// ============================================================================
// StateMachine
// ============================================================================

/// The Connection State Machine.
#[derive(Debug)]
pub struct StateMachine {
    config: ManagerConfig,
    backoff: BackoffPolicy,
    rng: StdRng,

    state: ConnectionState,
    generation: Generation,
    attempts: u32,
    exhausted: bool,

    reconnect_at: Option<Instant>,
    heartbeat: HeartbeatMonitor,
    queue: OutboundQueue,
    pending_acks: FxHashSet<MessageId>,
    suspension: Suspension,

    /// Wall-clock anchor for ping timestamps.
    epoch: Instant,
    epoch_unix_ms: u64,
}

// ============================================================================
// StateMachine - Constructors
// ============================================================================

impl StateMachine {
    /// Creates a disconnected machine with an entropy-seeded jitter source.
    #[must_use]
    pub fn new(config: ManagerConfig, now: Instant) -> Self {
        Self::with_rng(config, StdRng::from_entropy(), now)
    }

    /// Creates a disconnected machine with the given jitter source.
    #[must_use]
    pub fn with_rng(config: ManagerConfig, rng: StdRng, now: Instant) -> Self {
        let epoch_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();

        Self {
            backoff: config.backoff_policy(),
            heartbeat: HeartbeatMonitor::new(config.heartbeat_interval),
            queue: OutboundQueue::new(config.queue_capacity, config.queue_ttl),
            config,
            rng,
            state: ConnectionState::Disconnected,
            generation: Generation::ZERO,
            attempts: 0,
            exhausted: false,
            reconnect_at: None,
            pending_acks: FxHashSet::default(),
            suspension: Suspension::new(),
            epoch: now,
            epoch_unix_ms,
        }
    }
}

// ============================================================================
// StateMachine - Queries
// ============================================================================

impl StateMachine {
    /// Returns the current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the generation of the current (or last) attempt.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns a status snapshot.
    #[must_use]
    pub fn status(&self) -> Status {
        Status {
            state: self.state,
            reconnect_attempts: self.attempts,
            queued_count: self.queue.len(),
            pending_ack_count: self.pending_acks.len(),
        }
    }

    /// Returns the pending reconnect deadline, if any.
    #[inline]
    #[must_use]
    pub const fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Returns `true` while the heartbeat has a pending deadline.
    #[inline]
    #[must_use]
    pub const fn heartbeat_armed(&self) -> bool {
        self.heartbeat.is_armed()
    }

    /// Returns the earliest instant at which [`poll_timers`](Self::poll_timers)
    /// has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.reconnect_at, self.heartbeat.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

// ============================================================================
// StateMachine - Commands
// ============================================================================

impl StateMachine {
    /// Starts connecting. Idempotent while Connecting or Connected.
    ///
    /// From Disconnected the attempt counter restarts at zero. From
    /// Reconnecting the pending timer is cancelled and the attempt happens
    /// now, keeping the counter.
    pub fn connect(&mut self, now: Instant) -> Vec<Action> {
        let mut out = Vec::new();

        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                trace!(state = %self.state, "connect() ignored");
            }
            ConnectionState::Reconnecting => {
                self.suspension.release();
                self.begin_attempt(now, &mut out);
            }
            ConnectionState::Disconnected => {
                self.attempts = 0;
                self.exhausted = false;
                self.suspension.release();
                self.begin_attempt(now, &mut out);
            }
        }

        self.check_invariants();
        out
    }

    /// Closes the connection and stops reconnecting. Idempotent.
    pub fn disconnect(&mut self, now: Instant) -> Vec<Action> {
        let mut out = Vec::new();

        self.reconnect_at = None;
        self.heartbeat.disarm();
        self.suspension.release();
        self.exhausted = false;

        if self.state != ConnectionState::Disconnected {
            info!(generation = %self.generation, "Manual disconnect");
            self.transition(ConnectionState::Disconnected, now, &mut out);
            out.push(Action::Close {
                generation: self.generation,
                code: CLOSE_NORMAL,
                reason: REASON_MANUAL.to_owned(),
            });
            out.push(Action::Emit(ConnectionEvent::Disconnected {
                code: CLOSE_NORMAL,
                reason: REASON_MANUAL.to_owned(),
                cause: DisconnectCause::Manual,
            }));
        }

        self.check_invariants();
        out
    }

    /// Sends or queues a payload.
    ///
    /// Returns `true` if the payload was handed to the transport now.
    pub fn send(
        &mut self,
        payload: Payload,
        options: SendOptions,
        now: Instant,
    ) -> (bool, Vec<Action>) {
        let SendOptions { id, priority } = options;

        if self.state.is_connected() {
            if let Some(id) = id {
                self.pending_acks.insert(id);
            }
            let write = Action::Write {
                generation: self.generation,
                payload,
            };
            return (true, vec![write]);
        }

        if priority {
            debug!(state = %self.state, "Dropping priority message while not connected");
        } else {
            self.queue.push(payload, id, now);
            trace!(queued = self.queue.len(), "Message queued");
        }

        self.check_invariants();
        (false, Vec::new())
    }

    /// Applies an environment signal.
    pub fn signal(&mut self, signal: EnvironmentSignal, now: Instant) -> Vec<Action> {
        let mut out = Vec::new();

        match self.suspension.observe(signal, self.state, self.exhausted) {
            SignalOutcome::Ignore => {
                trace!(?signal, state = %self.state, "Signal ignored");
            }
            SignalOutcome::Hold => {
                if self.reconnect_at.take().is_some() {
                    info!("Reconnect timer cancelled while hidden");
                }
            }
            SignalOutcome::Resume => {
                info!(?signal, attempts = self.attempts, "Resuming connection");
                self.attempts = 0;
                self.exhausted = false;
                if matches!(
                    self.state,
                    ConnectionState::Reconnecting | ConnectionState::Disconnected
                ) {
                    self.begin_attempt(now, &mut out);
                }
            }
        }

        self.check_invariants();
        out
    }
}

// ============================================================================
// StateMachine - Transport Inputs
// ============================================================================

impl StateMachine {
    /// The transport of `generation` opened.
    pub fn transport_opened(&mut self, generation: Generation, now: Instant) -> Vec<Action> {
        let mut out = Vec::new();

        if generation != self.generation || self.state != ConnectionState::Connecting {
            debug!(%generation, current = %self.generation, "Ignoring stale open");
            return out;
        }

        info!(%generation, after_attempts = self.attempts, "Connected");
        self.attempts = 0;
        self.exhausted = false;
        self.transition(ConnectionState::Connected, now, &mut out);
        out.push(Action::Emit(ConnectionEvent::Connected));

        let queued = self.queue.drain_live(now);
        if !queued.is_empty() {
            debug!(count = queued.len(), "Flushing outbound queue");
        }
        for message in queued {
            if let Some(id) = message.id {
                self.pending_acks.insert(id);
            }
            out.push(Action::Write {
                generation,
                payload: message.payload,
            });
        }

        self.check_invariants();
        out
    }

    /// The transport of `generation` closed or failed.
    ///
    /// Errors and clean closes take the same path; only the code and reason
    /// are surfaced.
    pub fn transport_closed(
        &mut self,
        generation: Generation,
        code: u16,
        reason: impl Into<String>,
        now: Instant,
    ) -> Vec<Action> {
        let mut out = Vec::new();

        if generation != self.generation
            || !matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Connected
            )
        {
            debug!(%generation, current = %self.generation, "Ignoring stale close");
            return out;
        }

        let reason = reason.into();
        info!(%generation, code, reason = %reason, state = %self.state, "Transport closed");
        self.connection_lost(code, reason, DisconnectCause::Remote, now, &mut out);

        self.check_invariants();
        out
    }

    /// Creating the transport of `generation` failed synchronously.
    ///
    /// No retry: the same configuration would fail the same way.
    pub fn construction_failed(
        &mut self,
        generation: Generation,
        error: Error,
        now: Instant,
    ) -> Vec<Action> {
        let mut out = Vec::new();

        if generation != self.generation || self.state != ConnectionState::Connecting {
            debug!(%generation, "Ignoring stale construction failure");
            return out;
        }

        warn!(%generation, error = %error, "Transport construction failed");
        self.transition(ConnectionState::Disconnected, now, &mut out);
        out.push(Action::Emit(ConnectionEvent::error(error)));

        self.check_invariants();
        out
    }

    /// A payload arrived on the transport of `generation`.
    pub fn frame_received(
        &mut self,
        generation: Generation,
        payload: Payload,
        now: Instant,
    ) -> Vec<Action> {
        let mut out = Vec::new();

        if generation != self.generation || self.state != ConnectionState::Connected {
            debug!(%generation, "Ignoring frame from stale transport");
            return out;
        }

        match Inbound::classify(payload) {
            Inbound::Control(ControlFrame::Pong { timestamp }) => {
                trace!(%timestamp, "Pong received");
                self.heartbeat.record_pong(now);
            }

            Inbound::Control(ControlFrame::Ping { timestamp }) => {
                trace!(%timestamp, "Ping received, answering");
                self.write_control(ControlFrame::pong(timestamp), &mut out);
            }

            Inbound::Control(ControlFrame::Ack { message_id }) => {
                if self.pending_acks.remove(&message_id) {
                    trace!(%message_id, "Message acknowledged");
                    out.push(Action::Emit(ConnectionEvent::Acknowledged(message_id)));
                } else {
                    debug!(%message_id, "Ack for unknown message");
                }
            }

            Inbound::Application(payload) => {
                out.push(Action::Emit(ConnectionEvent::Message(payload)));
            }
        }

        out
    }

    /// A write to the transport of `generation` failed.
    ///
    /// The message is dropped. State is left alone; a dead transport
    /// reports its own close.
    pub fn write_failed(&mut self, generation: Generation, error: Error) -> Vec<Action> {
        warn!(%generation, error = %error, "Write failed, message dropped");
        vec![Action::Emit(ConnectionEvent::error(Error::send_failure(
            error.to_string(),
        )))]
    }
}

// ============================================================================
// StateMachine - Timers
// ============================================================================

impl StateMachine {
    /// Fires every timer due at `now`.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<Action> {
        let mut out = Vec::new();

        if let Some(at) = self.reconnect_at
            && now >= at
        {
            self.reconnect_at = None;
            if self.state == ConnectionState::Reconnecting {
                debug!(attempt = self.attempts, "Reconnect timer fired");
                self.begin_attempt(now, &mut out);
            }
        }

        if self.state == ConnectionState::Connected {
            match self.heartbeat.poll(now) {
                HeartbeatTick::Idle => {}

                HeartbeatTick::Ping => {
                    let timestamp = self.unix_millis(now);
                    trace!(timestamp, "Sending ping");
                    self.write_control(ControlFrame::ping(timestamp), &mut out);
                }

                HeartbeatTick::TimedOut { elapsed } => {
                    warn!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        generation = %self.generation,
                        "Heartbeat timeout, closing transport"
                    );
                    out.push(Action::Close {
                        generation: self.generation,
                        code: CLOSE_HEARTBEAT_TIMEOUT,
                        reason: REASON_HEARTBEAT.to_owned(),
                    });
                    self.connection_lost(
                        CLOSE_HEARTBEAT_TIMEOUT,
                        REASON_HEARTBEAT.to_owned(),
                        DisconnectCause::HeartbeatTimeout,
                        now,
                        &mut out,
                    );
                }
            }
        }

        self.check_invariants();
        out
    }
}

// ============================================================================
// StateMachine - Internals
// ============================================================================

impl StateMachine {
    /// Moves to `to`, keeping the heartbeat and ack set in step with it.
    fn transition(&mut self, to: ConnectionState, now: Instant, out: &mut Vec<Action>) {
        let from = self.state;
        if from == to {
            return;
        }

        debug_assert!(
            from.can_transition_to(to),
            "illegal transition {from} -> {to}"
        );

        if from == ConnectionState::Connected {
            self.heartbeat.disarm();
            if !self.pending_acks.is_empty() {
                debug!(dropped = self.pending_acks.len(), "Clearing pending acks");
                self.pending_acks.clear();
            }
        }
        if to != ConnectionState::Reconnecting {
            self.reconnect_at = None;
        }

        self.state = to;
        if to == ConnectionState::Connected && self.config.heartbeat_enabled {
            self.heartbeat.arm(now);
        }

        debug!(%from, %to, "State changed");
        out.push(Action::Emit(ConnectionEvent::StateChanged { from, to }));
    }

    /// Starts a new transport attempt.
    fn begin_attempt(&mut self, now: Instant, out: &mut Vec<Action>) {
        self.reconnect_at = None;
        self.generation = self.generation.next();
        self.transition(ConnectionState::Connecting, now, out);

        debug!(generation = %self.generation, attempt = self.attempts, "Opening transport");
        out.push(Action::Open(self.generation));
    }

    /// Shared close path: reconnect if budget remains, otherwise stop.
    fn connection_lost(
        &mut self,
        code: u16,
        reason: String,
        cause: DisconnectCause,
        now: Instant,
        out: &mut Vec<Action>,
    ) {
        if self.attempts >= self.config.max_reconnect_attempts {
            warn!(attempts = self.attempts, "Reconnect budget exhausted");
            self.exhausted = true;
            self.transition(ConnectionState::Disconnected, now, out);
            out.push(Action::Emit(ConnectionEvent::Disconnected {
                code,
                reason: Error::max_attempts_exceeded(self.attempts).to_string(),
                cause: DisconnectCause::MaxAttemptsExceeded,
            }));
            return;
        }

        self.transition(ConnectionState::Reconnecting, now, out);
        out.push(Action::Emit(ConnectionEvent::Disconnected {
            code,
            reason,
            cause,
        }));

        if self.suspension.is_hidden() {
            info!("Hidden, holding reconnect until visible");
            self.suspension.hold();
            return;
        }

        let delay = self.backoff.delay(self.attempts, &mut self.rng);
        self.attempts += 1;
        self.reconnect_at = Some(deadline_after(now, delay));
        info!(
            attempt = self.attempts,
            max = self.config.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
    }

    /// Queues a control frame write on the current transport.
    fn write_control(&self, frame: ControlFrame, out: &mut Vec<Action>) {
        match frame.to_payload() {
            Ok(payload) => out.push(Action::Write {
                generation: self.generation,
                payload,
            }),
            Err(e) => out.push(Action::Emit(ConnectionEvent::error(e))),
        }
    }

    /// Converts a monotonic instant into Unix milliseconds.
    fn unix_millis(&self, now: Instant) -> u64 {
        let since_epoch = now.saturating_duration_since(self.epoch);
        self.epoch_unix_ms
            .saturating_add(u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX))
    }

    fn check_invariants(&self) {
        debug_assert!(
            !self.heartbeat.is_armed() || self.state == ConnectionState::Connected,
            "heartbeat armed in {}",
            self.state
        );
        debug_assert!(
            self.reconnect_at.is_none() || self.state == ConnectionState::Reconnecting,
            "reconnect timer pending in {}",
            self.state
        );
        debug_assert!(self.queue.len() <= self.queue.capacity());
    }
}

// ============================================================================
// Tests
// ============================================================================
