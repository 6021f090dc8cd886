//! Error types for the connection manager.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Configuration errors are the only errors returned synchronously to the
//! caller. Everything that goes wrong on a live connection is recovered
//! locally and reported as [`ConnectionEvent::Error`](crate::ConnectionEvent::Error).
//!
//! ```ignore
//! use ws_lifeline::{ConnectionManager, Result, WebSocketConnector};
//!
//! fn example() -> Result<ConnectionManager> {
//!     ConnectionManager::builder(WebSocketConnector::new("wss://example.com/ws"))
//!         .max_reconnect_attempts(10)
//!         .build()
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::TransportConstruction`], [`Error::Connection`], [`Error::ConnectionTimeout`] |
//! | Liveness | [`Error::MaxAttemptsExceeded`] |
//! | Delivery | [`Error::SendFailure`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |
//!
//! Closes and heartbeat timeouts are not errors; they are reported through
//! [`DisconnectCause`](crate::DisconnectCause).

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when manager configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Transport could not be constructed.
    ///
    /// Raised synchronously by a connector (bad URL, unsupported scheme).
    /// Retrying a fixed bad configuration is pointless, so the manager stops.
    #[error("Transport construction failed: {message}")]
    TransportConstruction {
        /// Description of the construction failure.
        message: String,
    },

    /// Connection attempt failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Liveness Errors
    // ========================================================================
    /// Reconnect budget exhausted.
    ///
    /// Terminal until `connect()` is called again.
    #[error("Maximum reconnect attempts exceeded ({attempts})")]
    MaxAttemptsExceeded {
        /// Attempts made before giving up.
        attempts: u32,
    },

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// Write to a nominally connected transport failed.
    ///
    /// The message is dropped, never re-queued.
    #[error("Send failed: {message}")]
    SendFailure {
        /// Description of the write failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transport construction error.
    #[inline]
    pub fn transport_construction(message: impl Into<String>) -> Self {
        Self::TransportConstruction {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a max attempts exceeded error.
    #[inline]
    pub fn max_attempts_exceeded(attempts: u32) -> Self {
        Self::MaxAttemptsExceeded { attempts }
    }

    /// Creates a send failure error.
    #[inline]
    pub fn send_failure(message: impl Into<String>) -> Self {
        Self::SendFailure {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionTimeout { .. } | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors route through the reconnect path; the rest need
    /// caller intervention.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::SendFailure { .. }
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
