//! Control frames and inbound classification.
//!
//! Control frames are JSON text messages tagged by `type`. Anything that
//! does not parse as one of the reserved shapes is an application message,
//! including JSON objects whose `type` is some other value.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::MessageId;

use super::Payload;

// ============================================================================
// ControlFrame
// ============================================================================

/// A reserved protocol bookkeeping message.
///
/// # Format
///
/// ```json
/// { "type": "ping", "timestamp": 1700000000000 }
/// { "type": "pong", "timestamp": 1700000000000 }
/// { "type": "ack", "messageId": "msg-1" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    /// Liveness probe.
    ///
    /// Ours carry Unix milliseconds; a peer's may carry any JSON value, or
    /// none.
    Ping {
        /// Send time.
        #[serde(default, skip_serializing_if = "Value::is_null")]
        timestamp: Value,
    },

    /// Liveness reply.
    Pong {
        /// Echoed ping timestamp.
        #[serde(default, skip_serializing_if = "Value::is_null")]
        timestamp: Value,
    },

    /// Peer acknowledgment of a tracked message.
    Ack {
        /// Id passed in `SendOptions::id`.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
}

impl ControlFrame {
    /// Creates a ping frame stamped with Unix milliseconds.
    #[inline]
    #[must_use]
    pub fn ping(timestamp: u64) -> Self {
        Self::Ping {
            timestamp: Value::from(timestamp),
        }
    }

    /// Creates a pong frame echoing `timestamp`.
    #[inline]
    #[must_use]
    pub fn pong(timestamp: impl Into<Value>) -> Self {
        Self::Pong {
            timestamp: timestamp.into(),
        }
    }

    /// Encodes the frame as a text payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_payload(&self) -> Result<Payload> {
        Payload::json(self)
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Classification of a received payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Reserved frame handled by the manager.
    Control(ControlFrame),
    /// Everything else, forwarded to subscribers.
    Application(Payload),
}

impl Inbound {
    /// Classifies a received payload.
    ///
    /// Only text payloads that look like JSON objects are parsed.
    #[must_use]
    pub fn classify(payload: Payload) -> Self {
        if let Payload::Text(text) = &payload
            && text.trim_start().starts_with('{')
            && let Ok(frame) = serde_json::from_str::<ControlFrame>(text)
        {
            return Self::Control(frame);
        }

        Self::Application(payload)
    }
}

// ============================================================================
// Tests
// ============================================================================
