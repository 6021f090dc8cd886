//! Application payloads and send options.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_tungstenite::tungstenite::Message;

use crate::error::Result;
use crate::identifiers::MessageId;

// ============================================================================
// Payload
// ============================================================================

/// An opaque application message, text or binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Payload {
    /// Creates a text payload.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a binary payload.
    #[inline]
    #[must_use]
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Binary(bytes.into())
    }

    /// Serializes a value into a JSON text payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::Text(serde_json::to_string(value)?))
    }

    /// Decodes the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the payload is not valid JSON for `T`.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match self {
            Self::Text(text) => serde_json::from_str(text)?,
            Self::Binary(bytes) => serde_json::from_slice(bytes)?,
        };
        Ok(value)
    }

    /// Returns the text content, if this is a text payload.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts into a transport message.
    pub(crate) fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::text(text),
            Self::Binary(bytes) => Message::binary(bytes),
        }
    }

    /// Extracts a payload from a data message.
    ///
    /// Returns `None` for ping, pong, close and raw frames.
    pub(crate) fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Self::Text(text.as_str().to_owned())),
            Message::Binary(bytes) => Some(Self::Binary(bytes.to_vec())),
            _ => None,
        }
    }
}

impl From<&str> for Payload {
    #[inline]
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Payload {
    #[inline]
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    #[inline]
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

// ============================================================================
// SendOptions
// ============================================================================

/// Per-message options for `send_message`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Track this id until the peer acknowledges it.
    pub id: Option<MessageId>,

    /// Time-sensitive message: dropped instead of queued while disconnected.
    pub priority: bool,
}

impl SendOptions {
    /// Creates default options (no id, queue when disconnected).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            id: None,
            priority: false,
        }
    }

    /// Sets the acknowledgment id.
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Marks the message as not worth delaying.
    #[inline]
    #[must_use]
    pub fn with_priority(mut self) -> Self {
        self.priority = true;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Chat {
        room: String,
        body: String,
    }

    #[test]
    fn test_json_payload() {
        let chat = Chat {
            room: "lobby".into(),
            body: "hi".into(),
        };
        let payload = Payload::json(&chat).unwrap();
        assert_eq!(
            payload.as_text(),
            Some(r#"{"room":"lobby","body":"hi"}"#)
        );
        assert_eq!(payload.decode_json::<Chat>().unwrap(), chat);
    }

    #[test]
    fn test_decode_json_from_binary() {
        let payload = Payload::binary(br#"{"room":"a","body":"b"}"#.to_vec());
        let chat: Chat = payload.decode_json().unwrap();
        assert_eq!(chat.room, "a");
        assert!(payload.as_text().is_none());
    }

    #[test]
    fn test_message_conversion() {
        let message = Payload::text("hello").into_message();
        assert!(matches!(message, Message::Text(_)));
        assert_eq!(
            Payload::from_message(message),
            Some(Payload::text("hello"))
        );

        let message = Payload::binary(vec![1, 2, 3]).into_message();
        assert_eq!(
            Payload::from_message(message),
            Some(Payload::Binary(vec![1, 2, 3]))
        );

        assert_eq!(
            Payload::from_message(Message::Ping(Vec::<u8>::new().into())),
            None
        );
    }

    #[test]
    fn test_send_options_builder() {
        let options = SendOptions::new().with_id("m-1").with_priority();
        assert_eq!(options.id, Some(MessageId::new("m-1")));
        assert!(options.priority);
        assert_eq!(SendOptions::default(), SendOptions::new());
    }

    #[test]
    fn test_len() {
        assert_eq!(Payload::from("abc").len(), 3);
        assert!(Payload::binary(Vec::<u8>::new()).is_empty());
    }
}
