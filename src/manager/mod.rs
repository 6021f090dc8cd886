//! Connection manager facade and event loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  step (lock)   ┌──────────────┐
//! │ ConnectionManager│───────────────►│ StateMachine │
//! └──────────────────┘                └──────┬───────┘
//!          ▲                    events       │ IO actions
//!          │ signals       ┌─────────────────┤
//! ┌────────┴─────────┐     ▼                 ▼
//! │EnvironmentWatcher│  Subscribers     ┌──────────┐  frames  ┌───────────┐
//! └──────────────────┘                  │  Driver  │◄────────►│ Transport │
//!                                       └──────────┘          └───────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent construction and validation |
//! | `config` | Tuning knobs and defaults |
//! | `core` | The public facade |
//! | `driver` | Event loop owning the transport |
//! | `events` | Events and subscriptions |
//! | `watcher` | Environment signal forwarding |

// ============================================================================
// Submodules
// ============================================================================

/// Builder for [`ConnectionManager`].
pub mod builder;

/// Manager configuration.
pub mod config;

/// Public facade.
pub mod core;

/// Event loop.
mod driver;

/// Events and subscriptions.
pub mod events;

/// Environment signal forwarding.
pub mod watcher;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ManagerBuilder;
pub use config::{
    DEFAULT_BACKOFF_GROWTH_FACTOR, DEFAULT_BASE_RECONNECT_INTERVAL, DEFAULT_HEARTBEAT_INTERVAL,
    DEFAULT_MAX_JITTER, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_MAX_RECONNECT_INTERVAL,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_QUEUE_TTL, MAX_TIMER_INTERVAL, ManagerConfig,
};
pub use core::ConnectionManager;
pub use events::{ConnectionEvent, DisconnectCause, Subscription};
pub use watcher::EnvironmentWatcher;
