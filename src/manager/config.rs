//! Connection manager configuration.
//!
//! Provides a type-safe set of tuning knobs for reconnection, heartbeats and
//! the outbound queue.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use ws_lifeline::ManagerConfig;
//!
//! let config = ManagerConfig::new()
//!     .with_max_reconnect_attempts(10)
//!     .with_heartbeat_interval(Duration::from_secs(15))
//!     .with_queue_capacity(500);
//!
//! assert!(config.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::connection::BackoffPolicy;
use crate::error::{Error, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Default reconnect budget.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default delay before the first retry.
pub const DEFAULT_BASE_RECONNECT_INTERVAL: Duration = Duration::from_millis(1_000);

/// Default backoff ceiling.
pub const DEFAULT_MAX_RECONNECT_INTERVAL: Duration = Duration::from_millis(30_000);

/// Default backoff multiplier.
pub const DEFAULT_BACKOFF_GROWTH_FACTOR: f64 = 1.5;

/// Default jitter window.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1_000);

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);

/// Default outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default outbound queue TTL.
pub const DEFAULT_QUEUE_TTL: Duration = Duration::from_millis(300_000);

/// Longest accepted timer setting (heartbeat, backoff ceiling, jitter).
pub const MAX_TIMER_INTERVAL: Duration = Duration::from_secs(86_400);

// ============================================================================
// ManagerConfig
// ============================================================================

/// Tuning knobs for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Consecutive failed reconnects before giving up.
    pub max_reconnect_attempts: u32,

    /// Delay before the first retry (before jitter).
    pub base_reconnect_interval: Duration,

    /// Ceiling on the backoff delay (before jitter).
    pub max_reconnect_interval: Duration,

    /// Multiplier applied per attempt.
    pub backoff_growth_factor: f64,

    /// Jitter is drawn from `[0, max_jitter)`.
    pub max_jitter: Duration,

    /// Ping interval; twice this without a pong closes the connection.
    pub heartbeat_interval: Duration,

    /// Send pings and enforce the liveness timeout.
    pub heartbeat_enabled: bool,

    /// Maximum number of queued messages.
    pub queue_capacity: usize,

    /// Age after which a queued message is dropped.
    pub queue_ttl: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ManagerConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_reconnect_interval: DEFAULT_BASE_RECONNECT_INTERVAL,
            max_reconnect_interval: DEFAULT_MAX_RECONNECT_INTERVAL,
            backoff_growth_factor: DEFAULT_BACKOFF_GROWTH_FACTOR,
            max_jitter: DEFAULT_MAX_JITTER,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_enabled: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_ttl: DEFAULT_QUEUE_TTL,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ManagerConfig {
    /// Sets the reconnect budget.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the delay before the first retry.
    #[inline]
    #[must_use]
    pub fn with_base_reconnect_interval(mut self, interval: Duration) -> Self {
        self.base_reconnect_interval = interval;
        self
    }

    /// Sets the backoff ceiling.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_interval(mut self, interval: Duration) -> Self {
        self.max_reconnect_interval = interval;
        self
    }

    /// Sets the backoff multiplier.
    #[inline]
    #[must_use]
    pub fn with_backoff_growth_factor(mut self, factor: f64) -> Self {
        self.backoff_growth_factor = factor;
        self
    }

    /// Sets the jitter window. Zero disables jitter.
    #[inline]
    #[must_use]
    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Sets the heartbeat interval.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Enables or disables heartbeats.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_enabled(mut self, enabled: bool) -> Self {
        self.heartbeat_enabled = enabled;
        self
    }

    /// Sets the outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the outbound queue TTL.
    #[inline]
    #[must_use]
    pub fn with_queue_ttl(mut self, ttl: Duration) -> Self {
        self.queue_ttl = ttl;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ManagerConfig {
    /// Checks the configuration for values that can never work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.base_reconnect_interval.is_zero() {
            return Err(Error::config("base_reconnect_interval must be positive"));
        }

        if self.max_reconnect_interval < self.base_reconnect_interval {
            return Err(Error::config(format!(
                "max_reconnect_interval ({}ms) is below base_reconnect_interval ({}ms)",
                self.max_reconnect_interval.as_millis(),
                self.base_reconnect_interval.as_millis()
            )));
        }

        if self.max_reconnect_interval > MAX_TIMER_INTERVAL {
            return Err(Error::config(format!(
                "max_reconnect_interval must not exceed {}s",
                MAX_TIMER_INTERVAL.as_secs()
            )));
        }

        if self.max_jitter > MAX_TIMER_INTERVAL {
            return Err(Error::config(format!(
                "max_jitter must not exceed {}s",
                MAX_TIMER_INTERVAL.as_secs()
            )));
        }

        if !self.backoff_growth_factor.is_finite() || self.backoff_growth_factor < 1.0 {
            return Err(Error::config(format!(
                "backoff_growth_factor must be a finite number >= 1.0, got {}",
                self.backoff_growth_factor
            )));
        }

        if self.heartbeat_enabled && self.heartbeat_interval.is_zero() {
            return Err(Error::config(
                "heartbeat_interval must be positive when heartbeats are enabled",
            ));
        }

        if self.heartbeat_enabled && self.heartbeat_interval > MAX_TIMER_INTERVAL {
            return Err(Error::config(format!(
                "heartbeat_interval must not exceed {}s",
                MAX_TIMER_INTERVAL.as_secs()
            )));
        }

        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be at least 1"));
        }

        if self.queue_ttl.is_zero() {
            return Err(Error::config("queue_ttl must be positive"));
        }

        Ok(())
    }

    /// Returns the backoff policy described by this configuration.
    #[inline]
    #[must_use]
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.base_reconnect_interval,
            self.max_reconnect_interval,
            self.backoff_growth_factor,
            self.max_jitter,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.base_reconnect_interval, Duration::from_millis(1_000));
        assert_eq!(config.max_reconnect_interval, Duration::from_millis(30_000));
        assert!((config.backoff_growth_factor - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.heartbeat_interval, Duration::from_millis(30_000));
        assert!(config.heartbeat_enabled);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.queue_ttl, Duration::from_millis(300_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = ManagerConfig::new()
            .with_max_reconnect_attempts(3)
            .with_base_reconnect_interval(Duration::from_millis(100))
            .with_backoff_growth_factor(2.0)
            .with_max_jitter(Duration::ZERO)
            .with_heartbeat_enabled(false);

        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(
            config.backoff_policy().base_delay(2),
            Duration::from_millis(400)
        );
        assert!(!config.heartbeat_enabled);
    }

    #[test]
    fn test_rejects_shrinking_backoff() {
        let err = ManagerConfig::new()
            .with_backoff_growth_factor(0.5)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        assert!(
            ManagerConfig::new()
                .with_backoff_growth_factor(f64::NAN)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_rejects_inverted_intervals() {
        let result = ManagerConfig::new()
            .with_base_reconnect_interval(Duration::from_secs(60))
            .validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_zero_heartbeat_only_when_enabled() {
        let config = ManagerConfig::new().with_heartbeat_interval(Duration::ZERO);
        assert!(config.validate().is_err());
        assert!(config.with_heartbeat_enabled(false).validate().is_ok());
    }

    #[test]
    fn test_rejects_unbounded_timers() {
        let config = ManagerConfig::new().with_heartbeat_interval(Duration::MAX);
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
        assert!(config.with_heartbeat_enabled(false).validate().is_ok());

        assert!(
            ManagerConfig::new()
                .with_max_reconnect_interval(Duration::MAX)
                .validate()
                .is_err()
        );
        assert!(ManagerConfig::new().with_max_jitter(Duration::MAX).validate().is_err());

        let longest = ManagerConfig::new()
            .with_heartbeat_interval(MAX_TIMER_INTERVAL)
            .with_max_reconnect_interval(MAX_TIMER_INTERVAL)
            .with_max_jitter(MAX_TIMER_INTERVAL);
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_queue() {
        assert!(ManagerConfig::new().with_queue_capacity(0).validate().is_err());
        assert!(ManagerConfig::new().with_queue_ttl(Duration::ZERO).validate().is_err());
    }
}
