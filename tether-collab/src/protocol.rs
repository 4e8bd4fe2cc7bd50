//! Closed event vocabulary and binary codec for the document boundary.
//!
//! Everything that crosses between the document room and a session handle
//! is one of the tagged variants below, wrapped in a [`SyncMessage`]
//! envelope and bincode-encoded. Validating the payload on ingress keeps
//! the engines total functions over a known enum instead of trusting
//! arbitrary payload shapes.
//!
//! Wire format (bincode-encoded):
//! ```text
//! ┌──────────┬────────────┬──────────┬──────────┐
//! │ msg_type │ session_id │ seq      │ payload  │
//! │ 1 byte   │ 16 bytes   │ 8 bytes  │ variable │
//! └──────────┴────────────┴──────────┴──────────┘
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// A shared-string mutation
    Edit = 1,
    /// A cursor/selection reference transition
    Reference = 2,
    /// A participant joined or left
    Session = 3,
}

/// One change to the shared string, in total order.
///
/// Offsets and lengths count `char`s of the content as it was immediately
/// before the event applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocEvent {
    Insert { index: usize, text: String },
    Remove { index: usize, len: usize },
    Replace { text: String },
}

/// The two references every session publishes at most once each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKey {
    Cursor,
    Selection,
}

/// Value carried by a set reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceValue {
    Point(usize),
    Range { start: usize, end: usize },
}

impl ReferenceValue {
    /// Order the endpoints of a range; a point is returned unchanged.
    ///
    /// Range endpoints are order-independent on the wire (a selection made
    /// backwards has its lead before its anchor), so consumers normalize
    /// before converting to an ordered local range.
    pub fn normalized(self) -> Self {
        match self {
            Self::Range { start, end } if start > end => Self::Range { start: end, end: start },
            value => value,
        }
    }
}

/// Lifecycle transition of a published reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceEvent {
    /// The owning session announced the reference
    Published,
    /// The reference took a new value
    Set(ReferenceValue),
    /// The reference was unset without being destroyed
    Cleared,
    /// Terminal: the owning session disconnected
    Disposed,
}

/// Reference payload: which reference, and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceUpdate {
    pub key: ReferenceKey,
    pub event: ReferenceEvent,
}

/// Participant lifecycle payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    Opened { session_id: Uuid, username: String },
    Closed { session_id: Uuid },
}

/// Top-level envelope crossing the room↔session boundary.
///
/// `session_id` is the originator; `seq` is the room's total-order stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub msg_type: MessageType,
    pub session_id: Uuid,
    pub seq: u64,
    pub payload: Vec<u8>,
}

impl SyncMessage {
    /// Wrap a shared-string mutation.
    pub fn edit(session_id: Uuid, seq: u64, event: &DocEvent) -> Self {
        let payload = bincode::serde::encode_to_vec(event, bincode::config::standard())
            .unwrap_or_default();
        Self { msg_type: MessageType::Edit, session_id, seq, payload }
    }

    /// Wrap a reference transition.
    pub fn reference(session_id: Uuid, seq: u64, update: &ReferenceUpdate) -> Self {
        let payload = bincode::serde::encode_to_vec(update, bincode::config::standard())
            .unwrap_or_default();
        Self { msg_type: MessageType::Reference, session_id, seq, payload }
    }

    /// Wrap a participant lifecycle event.
    pub fn session(session_id: Uuid, seq: u64, event: &SessionEvent) -> Self {
        let payload = bincode::serde::encode_to_vec(event, bincode::config::standard())
            .unwrap_or_default();
        Self { msg_type: MessageType::Session, session_id, seq, payload }
    }

    /// Serialize to the binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from the binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(msg)
    }

    /// Parse the payload of an [`MessageType::Edit`] message.
    pub fn doc_event(&self) -> Result<DocEvent, ProtocolError> {
        if self.msg_type != MessageType::Edit {
            return Err(ProtocolError::InvalidMessageType);
        }
        decode_payload(&self.payload)
    }

    /// Parse the payload of a [`MessageType::Reference`] message.
    pub fn reference_update(&self) -> Result<ReferenceUpdate, ProtocolError> {
        if self.msg_type != MessageType::Reference {
            return Err(ProtocolError::InvalidMessageType);
        }
        decode_payload(&self.payload)
    }

    /// Parse the payload of a [`MessageType::Session`] message.
    pub fn session_event(&self) -> Result<SessionEvent, ProtocolError> {
        if self.msg_type != MessageType::Session {
            return Err(ProtocolError::InvalidMessageType);
        }
        decode_payload(&self.payload)
    }
}

fn decode_payload<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, ProtocolError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
    Ok(value)
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    InvalidMessageType,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::InvalidMessageType => write!(f, "Invalid message type"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_roundtrip() {
        let session = Uuid::new_v4();
        let event = DocEvent::Insert { index: 4, text: "ab\ncd".into() };

        let msg = SyncMessage::edit(session, 42, &event);
        let decoded = SyncMessage::decode(&msg.encode().unwrap()).unwrap();

        assert_eq!(decoded.msg_type, MessageType::Edit);
        assert_eq!(decoded.session_id, session);
        assert_eq!(decoded.seq, 42);
        assert_eq!(decoded.doc_event().unwrap(), event);
    }

    #[test]
    fn test_remove_roundtrip() {
        let event = DocEvent::Remove { index: 1, len: 3 };
        let msg = SyncMessage::edit(Uuid::new_v4(), 7, &event);
        let decoded = SyncMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.doc_event().unwrap(), event);
    }

    #[test]
    fn test_replace_roundtrip() {
        let event = DocEvent::Replace { text: "fresh".into() };
        let msg = SyncMessage::edit(Uuid::new_v4(), 0, &event);
        let decoded = SyncMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.doc_event().unwrap(), event);
    }

    #[test]
    fn test_reference_roundtrip() {
        let update = ReferenceUpdate {
            key: ReferenceKey::Selection,
            event: ReferenceEvent::Set(ReferenceValue::Range { start: 9, end: 2 }),
        };
        let msg = SyncMessage::reference(Uuid::new_v4(), 3, &update);
        let decoded = SyncMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.msg_type, MessageType::Reference);
        assert_eq!(decoded.reference_update().unwrap(), update);
    }

    #[test]
    fn test_session_roundtrip() {
        let id = Uuid::new_v4();
        let event = SessionEvent::Opened { session_id: id, username: "alice".into() };
        let msg = SyncMessage::session(id, 1, &event);
        let decoded = SyncMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.session_event().unwrap(), event);
    }

    #[test]
    fn test_wrong_type_payload_extraction_fails() {
        let msg = SyncMessage::edit(
            Uuid::new_v4(),
            0,
            &DocEvent::Replace { text: String::new() },
        );
        assert!(msg.reference_update().is_err());
        assert!(msg.session_event().is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(SyncMessage::decode(&[0xFF, 0xFE, 0xFD]).is_err());
    }

    #[test]
    fn test_range_normalization_orders_endpoints() {
        let inverted = ReferenceValue::Range { start: 5, end: 2 };
        assert_eq!(
            inverted.normalized(),
            ReferenceValue::Range { start: 2, end: 5 }
        );

        let ordered = ReferenceValue::Range { start: 2, end: 5 };
        assert_eq!(ordered.normalized(), ordered);

        let point = ReferenceValue::Point(3);
        assert_eq!(point.normalized(), point);
    }

    #[test]
    fn test_edit_message_size_efficient() {
        let event = DocEvent::Insert { index: 100, text: "x".into() };
        let msg = SyncMessage::edit(Uuid::new_v4(), 1, &event);
        let encoded = msg.encode().unwrap();
        // 1 type + 16 session + varint seq + short payload.
        assert!(encoded.len() < 64, "encoded size {} too large", encoded.len());
    }
}
