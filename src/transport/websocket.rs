//! WebSocket client connector.
//!
//! Connects with `tokio_tungstenite::connect_async` and bounds the TCP plus
//! handshake phase with a timeout.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ws_lifeline::WebSocketConnector;
//!
//! let connector = WebSocketConnector::new("wss://example.com/live")
//!     .with_connect_timeout(Duration::from_secs(5));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

use super::{BoxTransport, ConnectFuture, Connector};

// ============================================================================
// Constants
// ============================================================================

/// Default bound on TCP connect plus WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Connector for `ws://` and `wss://` endpoints.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    /// Endpoint as given by the caller.
    url: String,
    /// Bound on a single attempt.
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Creates a connector for `url`.
    ///
    /// The URL is validated on every attempt, so a bad URL surfaces as a
    /// construction failure on `connect()` rather than here.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the per-attempt connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the per-attempt connect timeout.
    #[inline]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Parses the endpoint and checks its scheme.
    fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.url).map_err(|e| {
            Error::transport_construction(format!("invalid URL '{}': {e}", self.url))
        })?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::transport_construction(format!(
                "unsupported scheme '{scheme}', expected ws or wss"
            ))),
        }
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self) -> Result<ConnectFuture> {
        let url = self.endpoint()?;
        let connect_timeout = self.connect_timeout;

        Ok(Box::pin(async move {
            debug!(url = %url, "Connecting");

            let (stream, response) = timeout(connect_timeout, connect_async(String::from(url)))
                .await
                .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))??;

            debug!(status = %response.status(), "WebSocket handshake completed");
            Ok(Box::new(stream) as BoxTransport)
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================
