//! In-process connector for tests.
//!
//! Each attempt runs a real tungstenite handshake over `tokio::io::duplex`.
//! The server half of every successful attempt is handed to the test through
//! a channel, so tests play the peer.
//!
//! Set `RUST_LOG` (for example `ws_lifeline=trace`) to see the manager's
//! logs while a test runs.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{WebSocketStream, accept_async, client_async};
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

use super::{BoxTransport, ConnectFuture, Connector};

// ============================================================================
// Types
// ============================================================================

/// Server side of an in-memory connection.
pub(crate) type MemoryPeer = WebSocketStream<DuplexStream>;

/// Buffer size of each duplex pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

// ============================================================================
// Logging
// ============================================================================

/// Installs a test-writer subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub(crate) fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector whose peers are driven by the test.
#[derive(Debug, Clone)]
pub(crate) struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    attempts: Arc<AtomicUsize>,
    broken: Arc<AtomicBool>,
    refusing: Arc<AtomicBool>,
}

impl MemoryConnector {
    /// Creates a connector and the receiver of its peers.
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers,
            attempts: Arc::new(AtomicUsize::new(0)),
            broken: Arc::new(AtomicBool::new(false)),
            refusing: Arc::new(AtomicBool::new(false)),
        };
        (connector, rx)
    }

    /// Number of `connect()` calls so far.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Makes `connect()` fail synchronously.
    pub(crate) fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// Makes attempts fail after `connect()` returned.
    pub(crate) fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

impl Connector for MemoryConnector {
    fn connect(&self) -> Result<ConnectFuture> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.broken.load(Ordering::SeqCst) {
            return Err(Error::transport_construction("memory transport is broken"));
        }

        let refusing = self.refusing.load(Ordering::SeqCst);
        let peers = self.peers.clone();

        Ok(Box::pin(async move {
            if refusing {
                return Err(Error::connection("connection refused"));
            }

            let (client_io, server_io) = tokio::io::duplex(PIPE_CAPACITY);
            let server = tokio::spawn(accept_async(server_io));
            let (client, _) = client_async("ws://memory/", client_io).await?;
            let server = server
                .await
                .map_err(|e| Error::connection(e.to_string()))??;

            peers
                .send(server)
                .map_err(|_| Error::connection("no peer listening"))?;
            Ok(Box::new(client) as BoxTransport)
        }))
    }
}
