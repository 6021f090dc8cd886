//! Environment signal forwarding.
//!
//! Bridges an external source of visibility and network signals (a platform
//! callback, a channel, a polling task) to a manager.
//!
//! # Example
//!
//! ```no_run
//! use ws_lifeline::{ConnectionManager, EnvironmentSignal, EnvironmentWatcher, WebSocketConnector};
//!
//! # async fn example() -> ws_lifeline::Result<()> {
//! let manager = ConnectionManager::builder(WebSocketConnector::new("wss://example.com/live"))
//!     .build()?;
//!
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! let _watcher = EnvironmentWatcher::spawn(
//!     &manager,
//!     tokio_stream_from(rx),
//! );
//! tx.send(EnvironmentSignal::Hidden).ok();
//! # Ok(())
//! # }
//! # fn tokio_stream_from(
//! #     mut rx: tokio::sync::mpsc::UnboundedReceiver<EnvironmentSignal>,
//! # ) -> impl futures_util::Stream<Item = EnvironmentSignal> {
//! #     futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx))
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connection::EnvironmentSignal;

use super::core::ConnectionManager;

// ============================================================================
// EnvironmentWatcher
// ============================================================================

/// Background task feeding environment signals into a manager.
///
/// Holds only a weak reference: the manager still shuts down when its last
/// handle drops. Dropping the watcher stops forwarding.
#[derive(Debug)]
pub struct EnvironmentWatcher {
    task: JoinHandle<()>,
}

impl EnvironmentWatcher {
    /// Starts forwarding `signals` to `manager`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<S>(manager: &ConnectionManager, signals: S) -> Self
    where
        S: Stream<Item = EnvironmentSignal> + Send + 'static,
    {
        let manager = manager.downgrade();

        let task = tokio::spawn(async move {
            let mut signals = std::pin::pin!(signals);

            while let Some(signal) = signals.next().await {
                let Some(inner) = manager.upgrade() else {
                    debug!("Manager gone, watcher stopping");
                    return;
                };
                ConnectionManager::from_inner(inner).signal(signal);
            }

            debug!("Signal source ended");
        });

        Self { task }
    }

    /// Returns `true` once the signal source ended or the manager is gone.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for EnvironmentWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
