//! Visibility and network watcher logic.
//!
//! Translates environment signals into suspend/resume decisions. A hidden
//! client stops scheduling reconnects ("held"); becoming visible or coming
//! back online resumes a held connection, or one that gave up after
//! exhausting its reconnect budget.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, info};

use super::ConnectionState;

// ============================================================================
// EnvironmentSignal
// ============================================================================

/// External signal about the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentSignal {
    /// Page/app became visible (foreground).
    Visible,
    /// Page/app was hidden (background).
    Hidden,
    /// Network became reachable.
    Online,
    /// Network became unreachable.
    Offline,
}

// ============================================================================
// SignalOutcome
// ============================================================================

/// What the state machine should do with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Nothing to do.
    Ignore,
    /// Cancel the pending reconnect timer and hold.
    Hold,
    /// Reset the attempt counter and connect now.
    Resume,
}

// ============================================================================
// Suspension
// ============================================================================

/// Environment flags tracked by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suspension {
    hidden: bool,
    held: bool,
}

impl Default for Suspension {
    fn default() -> Self {
        Self::new()
    }
}

impl Suspension {
    /// Visible, not held.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hidden: false,
            held: false,
        }
    }

    /// Returns `true` while the client is in the background.
    #[inline]
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Returns `true` while reconnection is held for suspension.
    #[inline]
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.held
    }

    /// Marks reconnection as held.
    #[inline]
    pub fn hold(&mut self) {
        self.held = true;
    }

    /// Clears the held flag.
    #[inline]
    pub fn release(&mut self) {
        self.held = false;
    }

    /// Records a signal and decides what it means in `state`.
    ///
    /// `exhausted` is `true` when the connection is Disconnected because the
    /// reconnect budget ran out.
    pub fn observe(
        &mut self,
        signal: EnvironmentSignal,
        state: ConnectionState,
        exhausted: bool,
    ) -> SignalOutcome {
        let resumable = self.held || (state == ConnectionState::Disconnected && exhausted);

        match signal {
            EnvironmentSignal::Hidden => {
                self.hidden = true;
                if state == ConnectionState::Reconnecting && !self.held {
                    debug!("Hidden while reconnecting, holding");
                    self.held = true;
                    return SignalOutcome::Hold;
                }
                SignalOutcome::Ignore
            }

            EnvironmentSignal::Visible => {
                self.hidden = false;
                if resumable {
                    self.held = false;
                    return SignalOutcome::Resume;
                }
                SignalOutcome::Ignore
            }

            EnvironmentSignal::Online => {
                if !self.hidden && resumable {
                    self.held = false;
                    return SignalOutcome::Resume;
                }
                SignalOutcome::Ignore
            }

            EnvironmentSignal::Offline => {
                // The transport fails on its own and takes the close path.
                info!("Network offline");
                SignalOutcome::Ignore
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
