//! Duplex transport seam.
//!
//! The manager never names a concrete socket type. It asks a [`Connector`]
//! for a fresh transport on every attempt and treats whatever comes back as
//! a stream of frames plus a sink for frames.
//!
//! # Connection Lifecycle
//!
//! 1. `Connector::connect` - Validate configuration and create the attempt.
//!    A synchronous error here is a construction failure: the manager stops.
//! 2. The returned future resolves to an open transport, or to an error that
//!    the manager treats like any other close.
//! 3. The event loop reads frames from the transport and writes frames to it
//!    until it closes, then drops it.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | `tokio-tungstenite` client connector |
//! | `memory` | In-process connector for tests |

// ============================================================================
// Imports
// ============================================================================

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket client connector.
pub mod websocket;

/// In-process connector backed by `tokio::io::duplex`.
#[cfg(test)]
pub(crate) mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::{DEFAULT_CONNECT_TIMEOUT, WebSocketConnector};

// ============================================================================
// Transport
// ============================================================================

/// A live duplex connection.
///
/// Implemented for every `Stream + Sink` over WebSocket [`Message`]s, which
/// covers `WebSocketStream` over any IO type.
pub trait Transport:
    Stream<Item = std::result::Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin
{
}

impl<T> Transport for T where
    T: Stream<Item = std::result::Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Send
        + Unpin
{
}

/// Owned, type-erased transport handle.
pub type BoxTransport = Box<dyn Transport>;

/// Pending transport attempt.
pub type ConnectFuture = BoxFuture<'static, Result<BoxTransport>>;

// ============================================================================
// Connector
// ============================================================================

/// Factory for transports.
///
/// Called once per connection attempt. Implementations must not perform IO
/// before returning: the returned future does the work.
pub trait Connector: Send + Sync + 'static {
    /// Creates a new connection attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportConstruction`](crate::Error::TransportConstruction)
    /// when the configuration can never produce a transport.
    fn connect(&self) -> Result<ConnectFuture>;
}
