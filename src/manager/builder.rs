//! Builder pattern for manager configuration.
//!
//! Provides a fluent API for configuring and creating [`ConnectionManager`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ws_lifeline::{ConnectionManager, WebSocketConnector};
//!
//! # async fn example() -> ws_lifeline::Result<()> {
//! let manager = ConnectionManager::builder(WebSocketConnector::new("wss://example.com/live"))
//!     .max_reconnect_attempts(10)
//!     .heartbeat_interval(Duration::from_secs(15))
//!     .build()?;
//!
//! manager.connect();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::runtime::Handle;

use crate::connection::StateMachine;
use crate::error::{Error, Result};
use crate::transport::Connector;

use super::config::ManagerConfig;
use super::core::ConnectionManager;
use super::driver;

// ============================================================================
// ManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`] instance.
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Clone)]
pub struct ManagerBuilder {
    /// Transport factory.
    connector: Arc<dyn Connector>,
    /// Tuning knobs.
    config: ManagerConfig,
    /// Fixed jitter seed.
    seed: Option<u64>,
}

impl fmt::Debug for ManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerBuilder")
            .field("config", &self.config)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ManagerBuilder Implementation
// ============================================================================

impl ManagerBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new(connector: impl Connector) -> Self {
        Self::with_connector(Arc::new(connector))
    }

    /// Creates a builder from a shared connector.
    #[must_use]
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            config: ManagerConfig::default(),
            seed: None,
        }
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the reconnect budget.
    #[inline]
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the delay before the first retry.
    #[inline]
    #[must_use]
    pub fn base_reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.base_reconnect_interval = interval;
        self
    }

    /// Sets the backoff ceiling.
    #[inline]
    #[must_use]
    pub fn max_reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.max_reconnect_interval = interval;
        self
    }

    /// Sets the backoff multiplier.
    #[inline]
    #[must_use]
    pub fn backoff_growth_factor(mut self, factor: f64) -> Self {
        self.config.backoff_growth_factor = factor;
        self
    }

    /// Sets the jitter window.
    #[inline]
    #[must_use]
    pub fn max_jitter(mut self, jitter: Duration) -> Self {
        self.config.max_jitter = jitter;
        self
    }

    /// Sets the heartbeat interval.
    #[inline]
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Enables or disables heartbeats.
    #[inline]
    #[must_use]
    pub fn heartbeat_enabled(mut self, enabled: bool) -> Self {
        self.config.heartbeat_enabled = enabled;
        self
    }

    /// Sets the outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets how long a queued message stays deliverable.
    #[inline]
    #[must_use]
    pub fn queue_ttl(mut self, ttl: Duration) -> Self {
        self.config.queue_ttl = ttl;
        self
    }

    /// Seeds the jitter source for reproducible delays.
    #[inline]
    #[must_use]
    pub fn jitter_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration and starts the manager's event loop.
    ///
    /// The manager starts Disconnected; call
    /// [`connect()`](ConnectionManager::connect) to open it.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn build(self) -> Result<ConnectionManager> {
        self.config.validate()?;

        let runtime = Handle::try_current().map_err(|_| {
            Error::config(
                "ConnectionManager must be built inside a tokio runtime.\n\
                 Call build() from an async context or within Runtime::enter().",
            )
        })?;

        let now = driver::now();
        let machine = match self.seed {
            Some(seed) => StateMachine::with_rng(self.config, StdRng::seed_from_u64(seed), now),
            None => StateMachine::new(self.config, now),
        };

        let (shared, commands) = driver::Shared::new(machine);
        let event_loop = driver::Driver::new(Arc::clone(&shared), self.connector, commands);
        let task = runtime.spawn(event_loop.run());

        Ok(ConnectionManager::new(shared, task))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::WebSocketConnector;

    fn builder() -> ManagerBuilder {
        ManagerBuilder::new(WebSocketConnector::new("ws://localhost:9/"))
    }

    #[test]
    fn test_setters_update_config() {
        let builder = builder()
            .max_reconnect_attempts(3)
            .base_reconnect_interval(Duration::from_millis(100))
            .backoff_growth_factor(2.0)
            .heartbeat_enabled(false)
            .queue_capacity(10);

        assert_eq!(builder.config.max_reconnect_attempts, 3);
        assert_eq!(
            builder.config.base_reconnect_interval,
            Duration::from_millis(100)
        );
        assert!(!builder.config.heartbeat_enabled);
        assert_eq!(builder.config.queue_capacity, 10);
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let result = builder().build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let result = builder().queue_capacity(0).build();
        let Err(err) = result else {
            panic!("invalid config accepted");
        };
        assert!(err.to_string().contains("queue_capacity"));

        let result = builder().heartbeat_interval(Duration::MAX).build();
        let Err(err) = result else {
            panic!("unbounded heartbeat accepted");
        };
        assert!(err.to_string().contains("heartbeat_interval"));
    }

    #[tokio::test]
    async fn test_build_starts_disconnected() {
        let manager = builder().build().unwrap();
        assert_eq!(
            manager.status().state,
            crate::connection::ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = builder().jitter_seed(9);
        let cloned = builder.clone();
        assert_eq!(cloned.seed, Some(9));
    }
}
