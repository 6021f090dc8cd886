//! ws-lifeline - Resilient duplex connection manager.
//!
//! This library keeps one logical connection to a server alive across
//! network flakiness, backgrounding and server restarts, without losing
//! messages sent while the link is down and without reconnect storms.
//!
//! # Architecture
//!
//! The manager is split into a synchronous core and an async shell:
//!
//! - **State machine**: pure, clock-driven; decides every transition, timer
//!   and write, and never touches a socket
//! - **Event loop**: one tokio task per manager; owns the transport handle
//!   and performs what the state machine asks for
//! - **Facade**: [`ConnectionManager`]; every call returns immediately
//!
//! Key design principles:
//!
//! - At most one live transport and one pending reconnect timer
//! - Heartbeat runs only while connected
//! - Failures are recovered locally and reported as events
//!
//! # Quick Start
//!
//! ```no_run
//! use ws_lifeline::{ConnectionEvent, ConnectionManager, Result, SendOptions, WebSocketConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::builder(WebSocketConnector::new("wss://example.com/live"))
//!         .max_reconnect_attempts(10)
//!         .build()?;
//!
//!     let mut events = manager.subscribe();
//!     manager.connect();
//!
//!     // Queued until the connection opens.
//!     manager.send_message("hello", SendOptions::new());
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             ConnectionEvent::Message(payload) => println!("message: {payload:?}"),
//!             ConnectionEvent::Disconnected { code, reason, .. } => {
//!                 println!("closed: {code} {reason}");
//!             }
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | State machine, backoff, heartbeat, queue |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`manager`] | [`ConnectionManager`] facade and configuration |
//! | [`protocol`] | Payloads and control frames |
//! | [`transport`] | Transport seam and WebSocket connector |
//!
//! # Control Frames
//!
//! Three JSON text shapes are reserved and never delivered as messages:
//!
//! - `{"type":"ping","timestamp":...}` - sent by the manager
//! - `{"type":"pong","timestamp":...}` - liveness reply
//! - `{"type":"ack","messageId":"..."}` - peer acknowledgment

// ============================================================================
// Modules
// ============================================================================

/// Connection lifecycle core.
///
/// Transport-agnostic and synchronous: every input is stamped with the
/// current time and every side effect is returned as an action.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Connection manager facade.
///
/// Use [`ConnectionManager::builder()`] to create a configured instance.
pub mod manager;

/// Payloads and reserved control frames.
pub mod protocol;

/// Transport seam.
///
/// [`Connector`] creates one transport per attempt; [`WebSocketConnector`]
/// is the stock implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{ConnectionState, EnvironmentSignal, Status};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{MessageId, SubscriptionId};

// Manager types
pub use manager::{
    ConnectionEvent, ConnectionManager, DisconnectCause, EnvironmentWatcher, ManagerBuilder,
    ManagerConfig, Subscription,
};

// Protocol types
pub use protocol::{Payload, SendOptions};

// Transport types
pub use transport::{BoxTransport, Connector, Transport, WebSocketConnector};
