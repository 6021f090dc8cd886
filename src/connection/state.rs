//! Connection lifecycle state and its legal transitions.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the logical connection.
///
/// ```text
///                connect()                 open
/// Disconnected ───────────► Connecting ───────────► Connected
///      ▲                     │   ▲                      │
///      │  exhausted/manual   │   │ timer / resume       │ close, timeout
///      ├─────────────────────┘   │                      │
///      │                     Reconnecting ◄─────────────┘
///      └─────────────────────────┘ manual
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No transport and nothing scheduled.
    #[default]
    Disconnected,
    /// A transport attempt is in flight.
    Connecting,
    /// Transport open; writes go straight through.
    Connected,
    /// Waiting for the backoff timer, or held while suspended.
    Reconnecting,
}

impl ConnectionState {
    /// Returns `true` if `self -> to` is a legal edge.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        use ConnectionState::{Connected, Connecting, Disconnected, Reconnecting};

        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Reconnecting)
                | (Connecting, Disconnected)
                | (Connected, Reconnecting)
                | (Connected, Disconnected)
                | (Reconnecting, Connecting)
                | (Reconnecting, Disconnected)
        )
    }

    /// Returns `true` if writes go straight to the transport.
    #[inline]
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
