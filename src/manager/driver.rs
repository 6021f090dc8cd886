//! Manager event loop.
//!
//! One spawned task per manager owns the transport handle and the pending
//! attempt. Every step of the state machine, whether triggered by the
//! facade or by this loop, runs under the machine lock and hands its IO
//! actions to the loop through one channel, so actions execute in exactly
//! the order the machine produced them.
//!
//! # Event Loop
//!
//! The loop waits on four sources at once:
//!
//! - Actions from the state machine (open, write, close)
//! - Completion of the pending connection attempt
//! - Frames from the live transport
//! - The machine's next timer deadline

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace, warn};

use crate::connection::{Action, CLOSE_ABNORMAL, CLOSE_NORMAL, StateMachine};
use crate::error::{Error, Result};
use crate::identifiers::Generation;
use crate::protocol::Payload;
use crate::transport::{BoxTransport, ConnectFuture, Connector};

use super::events::Subscribers;

// ============================================================================
// Types
// ============================================================================

/// Instructions for the event loop.
#[derive(Debug)]
pub(crate) enum Command {
    /// Perform IO actions, in order. May be empty to re-read the deadline.
    Perform(Vec<Action>),
    /// Close the transport and exit.
    Shutdown,
}

/// Frame or end-of-stream from the live transport.
type Inbound = (Generation, Option<std::result::Result<Message, WsError>>);

/// Returns the current time on the runtime clock.
///
/// Goes through tokio so paused test clocks apply.
#[inline]
pub(crate) fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between the facade and the event loop.
#[derive(Debug)]
pub(crate) struct Shared {
    machine: Mutex<StateMachine>,
    subscribers: Mutex<Subscribers>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Shared {
    /// Creates the shared state and the command receiver for the loop.
    pub(crate) fn new(machine: StateMachine) -> (Arc<Self>, mpsc::UnboundedReceiver<Command>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Self {
            machine: Mutex::new(machine),
            subscribers: Mutex::new(Subscribers::default()),
            commands,
        });
        (shared, rx)
    }

    /// Runs one machine step and dispatches its actions.
    ///
    /// Events go to subscribers and IO goes to the loop while the machine
    /// lock is still held, so concurrent steps cannot interleave.
    pub(crate) fn step<T>(
        &self,
        f: impl FnOnce(&mut StateMachine, Instant) -> (T, Vec<Action>),
    ) -> T {
        let mut machine = self.machine.lock();
        let deadline = machine.next_deadline();
        let (value, actions) = f(&mut machine, now());

        let mut io = Vec::new();
        for action in actions {
            match action {
                Action::Emit(event) => self.subscribers.lock().dispatch(&event),
                other => io.push(other),
            }
        }

        if !io.is_empty() || machine.next_deadline() != deadline {
            // Fails only once the loop is gone, when there is nothing to do.
            let _ = self.commands.send(Command::Perform(io));
        }

        value
    }

    /// Runs a step that only produces actions.
    #[inline]
    pub(crate) fn apply(&self, f: impl FnOnce(&mut StateMachine, Instant) -> Vec<Action>) {
        self.step(|machine, now| ((), f(machine, now)));
    }

    /// Reads from the machine without stepping it.
    #[inline]
    pub(crate) fn inspect<T>(&self, f: impl FnOnce(&StateMachine) -> T) -> T {
        f(&self.machine.lock())
    }

    /// Returns the subscriber registry.
    #[inline]
    pub(crate) fn subscribers(&self) -> &Mutex<Subscribers> {
        &self.subscribers
    }

    /// Asks the loop to exit.
    pub(crate) fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

// ============================================================================
// Driver
// ============================================================================

/// The event loop.
pub(crate) struct Driver {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Attempt in flight.
    pending: Option<(Generation, ConnectFuture)>,
    /// Open transport.
    live: Option<(Generation, BoxTransport)>,
}

impl Driver {
    /// Creates the loop state.
    pub(crate) fn new(
        shared: Arc<Shared>,
        connector: Arc<dyn Connector>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            shared,
            connector,
            commands,
            pending: None,
            live: None,
        }
    }

    /// Runs until shutdown.
    pub(crate) async fn run(mut self) {
        debug!("Event loop started");

        loop {
            let deadline = self.shared.inspect(StateMachine::next_deadline);

            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Perform(actions)) => {
                            for action in actions {
                                self.perform(action).await;
                            }
                        }

                        Some(Command::Shutdown) | None => {
                            debug!("Shutdown command received");
                            break;
                        }
                    }
                }

                (generation, result) = resolve(&mut self.pending) => {
                    self.pending = None;
                    self.attempt_finished(generation, result);
                }

                (generation, frame) = next_frame(&mut self.live) => {
                    self.handle_frame(generation, frame);
                }

                () = sleep_until(deadline) => {
                    self.shared.apply(StateMachine::poll_timers);
                }
            }
        }

        self.pending = None;
        if let Some((generation, transport)) = self.live.take() {
            close_transport(generation, transport, CLOSE_NORMAL, "normal closure".to_owned());
        }

        debug!("Event loop terminated");
    }

    /// Executes one IO action.
    async fn perform(&mut self, action: Action) {
        match action {
            Action::Open(generation) => self.open(generation),

            Action::Write {
                generation,
                payload,
            } => self.write(generation, payload).await,

            Action::Close {
                generation,
                code,
                reason,
            } => self.close(generation, code, reason),

            Action::Emit(event) => {
                self.shared.subscribers.lock().dispatch(&event);
            }
        }
    }

    /// Releases the previous handle and starts a new attempt.
    fn open(&mut self, generation: Generation) {
        if let Some((previous, transport)) = self.live.take() {
            close_transport(previous, transport, CLOSE_NORMAL, "replaced".to_owned());
        }
        self.pending = None;

        match self.connector.connect() {
            Ok(attempt) => {
                trace!(%generation, "Attempt started");
                self.pending = Some((generation, attempt));
            }
            Err(e) => {
                self.shared
                    .apply(|machine, now| machine.construction_failed(generation, e, now));
            }
        }
    }

    /// Writes a payload to the live transport of `generation`.
    ///
    /// A write for the current generation whose transport is already gone
    /// counts as a failed write.
    async fn write(&mut self, generation: Generation, payload: Payload) {
        let transport = match &mut self.live {
            Some((current, transport)) if *current == generation => transport,
            _ => {
                if self.shared.inspect(StateMachine::generation) == generation {
                    debug!(%generation, "Transport gone, write failed");
                    self.shared.apply(|machine, _| {
                        machine.write_failed(generation, Error::connection("transport closed"))
                    });
                } else {
                    debug!(%generation, "Stale write dropped");
                }
                return;
            }
        };

        if let Err(e) = transport.send(payload.into_message()).await {
            self.shared
                .apply(|machine, _| machine.write_failed(generation, Error::from(e)));
        }
    }

    /// Closes the transport or abandons the attempt of `generation`.
    fn close(&mut self, generation: Generation, code: u16, reason: String) {
        if matches!(&self.pending, Some((pending, _)) if *pending == generation) {
            debug!(%generation, "Attempt abandoned");
            self.pending = None;
        }

        if matches!(&self.live, Some((live, _)) if *live == generation)
            && let Some((_, transport)) = self.live.take()
        {
            close_transport(generation, transport, code, reason);
        }
    }

    /// Reports the outcome of an attempt to the machine.
    fn attempt_finished(&mut self, generation: Generation, result: Result<BoxTransport>) {
        match result {
            Ok(transport) => {
                self.live = Some((generation, transport));
                self.shared
                    .apply(|machine, now| machine.transport_opened(generation, now));
            }
            Err(e) => {
                debug!(%generation, error = %e, "Attempt failed");
                self.shared.apply(|machine, now| {
                    machine.transport_closed(generation, CLOSE_ABNORMAL, e.to_string(), now)
                });
            }
        }
    }

    /// Routes one transport read.
    fn handle_frame(
        &mut self,
        generation: Generation,
        frame: Option<std::result::Result<Message, WsError>>,
    ) {
        let (code, reason) = match frame {
            Some(Ok(Message::Close(close))) => {
                debug!(%generation, "WebSocket closed by remote");
                close.map_or((CLOSE_ABNORMAL, String::new()), |frame| {
                    (u16::from(frame.code), frame.reason.as_str().to_owned())
                })
            }

            Some(Ok(message)) => {
                if let Some(payload) = Payload::from_message(message) {
                    self.shared
                        .apply(|machine, now| machine.frame_received(generation, payload, now));
                }
                // Transport-level ping/pong is answered by tungstenite.
                return;
            }

            Some(Err(e)) => {
                warn!(%generation, error = %e, "WebSocket error");
                (CLOSE_ABNORMAL, e.to_string())
            }

            None => {
                debug!(%generation, "WebSocket stream ended");
                (CLOSE_ABNORMAL, "stream ended".to_owned())
            }
        };

        self.live = None;
        self.shared
            .apply(|machine, now| machine.transport_closed(generation, code, reason, now));
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Waits for the pending attempt; never resolves without one.
async fn resolve(
    attempt: &mut Option<(Generation, ConnectFuture)>,
) -> (Generation, Result<BoxTransport>) {
    match attempt {
        Some((generation, future)) => {
            let generation = *generation;
            (generation, future.await)
        }
        None => pending().await,
    }
}

/// Reads the next frame; never resolves without a live transport.
async fn next_frame(live: &mut Option<(Generation, BoxTransport)>) -> Inbound {
    match live {
        Some((generation, transport)) => (*generation, transport.next().await),
        None => pending().await,
    }
}

/// Sleeps until `deadline`; never resolves without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => pending().await,
    }
}

/// Sends a close frame and drops the transport in the background.
///
/// The handle is released immediately; a slow peer cannot stall the loop.
fn close_transport(generation: Generation, mut transport: BoxTransport, code: u16, reason: String) {
    tokio::spawn(async move {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        };
        if let Err(e) = transport.send(Message::Close(Some(frame))).await {
            trace!(%generation, error = %e, "Close frame not sent");
        }
        let _ = transport.close().await;
        trace!(%generation, "Transport released");
    });
}

// ============================================================================
// Tests
// ============================================================================
