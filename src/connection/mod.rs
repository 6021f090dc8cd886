//! Connection lifecycle core.
//!
//! Everything in this module is synchronous and transport-agnostic. The
//! [`StateMachine`] consumes inputs stamped with the current [`Instant`] and
//! returns [`Action`]s; the manager's event loop performs them.
//!
//! # Lifecycle
//!
//! ```text
//!                 connect()
//!  Disconnected ────────────► Connecting ──── open ────► Connected
//!       ▲                      │    ▲                       │
//!       │  budget exhausted /  │    │ timer / connect() /   │ close / error /
//!       │  construction error  │    │ resume signal         │ heartbeat timeout
//!       │                      ▼    │                       ▼
//!       └──────────────────── Reconnecting ◄────────────────┘
//! ```
//!
//! `disconnect()` moves any state to Disconnected.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Exponential backoff with jitter |
//! | `environment` | Visibility and network suspension |
//! | `heartbeat` | Ping scheduling and liveness window |
//! | `machine` | The state machine |
//! | `queue` | Bounded, expiring outbound queue |
//! | `state` | Lifecycle states and legal edges |

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

// ============================================================================
// Submodules
// ============================================================================

/// Exponential backoff with jitter.
pub mod backoff;

/// Visibility and network suspension.
pub mod environment;

/// Ping scheduling and liveness window.
pub mod heartbeat;

/// The connection state machine.
pub mod machine;

/// Bounded, expiring outbound queue.
pub mod queue;

/// Lifecycle states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::BackoffPolicy;
pub use environment::{EnvironmentSignal, SignalOutcome, Suspension};
pub use heartbeat::{HeartbeatMonitor, HeartbeatTick};
pub use machine::{
    Action, CLOSE_ABNORMAL, CLOSE_HEARTBEAT_TIMEOUT, CLOSE_NORMAL, StateMachine, Status,
};
pub use queue::{OutboundQueue, QueuedMessage};
pub use state::ConnectionState;

// ============================================================================
// Helpers
// ============================================================================

/// Returns `at + by`, or the latest representable instant short of it.
pub(crate) fn deadline_after(at: Instant, by: Duration) -> Instant {
    let mut by = by;
    loop {
        if let Some(deadline) = at.checked_add(by) {
            return deadline;
        }
        by /= 2;
    }
}
