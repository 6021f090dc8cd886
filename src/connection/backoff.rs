//! Reconnect delay policy.
//!
//! `delay(attempt) = min(base * growth^attempt, max) + jitter`, with jitter
//! drawn uniformly from `[0, max_jitter)`. The first retry uses attempt 0.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

// ============================================================================
// BackoffPolicy
// ============================================================================

/// Exponential backoff with a ceiling and additive jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay for attempt 0, before jitter.
    pub base: Duration,
    /// Ceiling applied before jitter.
    pub max: Duration,
    /// Multiplier per attempt (>= 1.0).
    pub growth: f64,
    /// Upper bound (exclusive) of the random addition.
    pub max_jitter: Duration,
}

impl BackoffPolicy {
    /// Creates a policy.
    #[inline]
    #[must_use]
    pub const fn new(base: Duration, max: Duration, growth: f64, max_jitter: Duration) -> Self {
        Self {
            base,
            max,
            growth,
            max_jitter,
        }
    }

    /// Returns the delay for `attempt` without jitter.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let max_nanos = self.max.as_nanos() as f64;
        let scaled = self.base.as_nanos() as f64 * self.growth.powi(exponent);

        // powi overflows to +inf for large attempts; min() clamps it.
        let capped = scaled.min(max_nanos);
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_nanos(capped.round() as u64)
        } else {
            self.max
        }
    }

    /// Draws a jitter value in `[0, max_jitter)`.
    #[must_use]
    pub fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..max_ms))
    }

    /// Returns the jittered delay before retry number `attempt`.
    #[must_use]
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.base_delay(attempt).saturating_add(self.jitter(rng))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(1_000),
            Duration::from_millis(30_000),
            1.5,
            Duration::from_millis(1_000),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
