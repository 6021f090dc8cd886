//! Wire-level message types.
//!
//! The manager treats application payloads as opaque. Three reserved JSON
//! shapes are interpreted by the manager itself and never reach the
//! application:
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | `{"type":"ping","timestamp":N}` | Local → Remote | Liveness probe |
//! | `{"type":"pong","timestamp":N}` | Remote → Local | Liveness reply |
//! | `{"type":"ack","messageId":"..."}` | Remote → Local | Delivery acknowledgment |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Control frames and inbound classification |
//! | `payload` | Application payloads and send options |

// ============================================================================
// Submodules
// ============================================================================

/// Control frames and inbound classification.
pub mod frame;

/// Application payloads and send options.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{ControlFrame, Inbound};
pub use payload::{Payload, SendOptions};
