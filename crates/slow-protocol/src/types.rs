//! Core protocol types for the SLOW wire format.
//!
//! A [`Message`] is the in-memory form of exactly one datagram. Fields are
//! kept as separate typed values here; they are only packed together (for
//! example flags and session TTL sharing one 32-bit word) by the codec.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{ProtocolError, SESSION_ID_SIZE};

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// The 16-byte identifier of a session.
///
/// The remote peer assigns it when the handshake completes. Until then the
/// client uses the all-zero [`SessionId::NIL`]. The same id is presented
/// again to revive a session later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub [u8; SESSION_ID_SIZE]);

impl SessionId {
    /// The all-zero id used before a peer has issued one.
    pub const NIL: SessionId = SessionId([0; SESSION_ID_SIZE]);

    /// Returns `true` if this is the all-zero id.
    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    /// Generates a random RFC 9562 version-8 UUID.
    ///
    /// Peers issue ids of this shape; the client only needs it to stand in
    /// for a peer (tests, local tooling).
    pub fn random_v8() -> Self {
        let mut bytes: [u8; SESSION_ID_SIZE] = rand::rng().random();
        bytes[6] = (bytes[6] & 0x0F) | 0x80;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// The five control flags carried in the low bits of the packed word.
    ///
    /// Bit positions are part of the wire contract (low → high):
    /// MOREBITS(0), ACCEPT(1), ACK(2), REVIVE(3), CONNECT(4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        /// More fragments of the same message follow.
        const MOREBITS = 1 << 0;
        /// The peer accepted a connect or revive request.
        const ACCEPT = 1 << 1;
        /// The `ack` field is a valid cumulative acknowledgment.
        const ACK = 1 << 2;
        /// Resume a previously established session.
        const REVIVE = 1 << 3;
        /// Open a new session.
        const CONNECT = 1 << 4;
    }
}

impl Flags {
    /// Mask selecting the flag bits out of the packed header word.
    pub const WIRE_MASK: u32 = 0x1F;

    /// Renders the set as `CONNECT|ACK`, or `-` when empty.
    ///
    /// Used as a compact field value in log events.
    pub fn describe(&self) -> String {
        const NAMES: [(Flags, &str); 5] = [
            (Flags::CONNECT, "CONNECT"),
            (Flags::REVIVE, "REVIVE"),
            (Flags::ACK, "ACK"),
            (Flags::ACCEPT, "ACCEPT"),
            (Flags::MOREBITS, "MOREBITS"),
        ];

        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();

        if names.is_empty() {
            "-".to_string()
        } else {
            names.join("|")
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One SLOW datagram.
///
/// `fragment_id` groups the pieces of one fragmented application message;
/// `fragment_offset` is the ordinal of the piece (0, 1, 2, ...), not a byte
/// offset. Every piece except the last carries [`Flags::MOREBITS`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// Session this datagram belongs to.
    pub session_id: SessionId,
    /// Control flags.
    pub flags: Flags,
    /// Session time-to-live as last issued by the peer (27 bits on the wire).
    pub session_ttl: u32,
    /// Sequence number of this datagram.
    pub seq: u32,
    /// Cumulative acknowledgment, meaningful when [`Flags::ACK`] is set.
    pub ack: u32,
    /// Receive window advertised by the sender, in bytes.
    pub window: u16,
    /// Fragment group, 0 for unfragmented messages.
    pub fragment_id: u8,
    /// Ordinal of this fragment within its group.
    pub fragment_offset: u8,
    /// Application bytes, at most [`crate::MAX_DATA`].
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates an empty message carrying only the given flags.
    pub fn with_flags(flags: Flags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Encodes this message into its wire representation.
    ///
    /// See [`crate::encode`].
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        crate::encode(self)
    }

    /// Decodes a message from a received datagram.
    ///
    /// See [`crate::decode`].
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        crate::decode(buf)
    }

    /// Returns `true` if every flag in `flags` is set.
    pub fn has(&self, flags: Flags) -> bool {
        self.flags.contains(flags)
    }

    /// Total encoded size: header plus payload.
    pub fn wire_len(&self) -> usize {
        crate::HEADER_SIZE + self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_nil_is_nil() {
        assert!(SessionId::NIL.is_nil());
        assert!(SessionId::default().is_nil());
        assert!(!SessionId([1; SESSION_ID_SIZE]).is_nil());
    }

    #[test]
    fn test_session_id_random_v8_sets_version_and_variant() {
        let id = SessionId::random_v8();
        assert_eq!(id.0[6] & 0xF0, 0x80, "version nibble must be 8");
        assert_eq!(id.0[8] & 0xC0, 0x80, "variant bits must be 10");
    }

    #[test]
    fn test_session_id_display_is_lowercase_hex() {
        let mut bytes = [0u8; SESSION_ID_SIZE];
        bytes[0] = 0xAB;
        bytes[15] = 0x01;
        let id = SessionId(bytes);
        assert_eq!(id.to_string(), "ab000000000000000000000000000001");
    }

    #[test]
    fn test_session_id_serializes_as_plain_array() {
        let id = SessionId([7; SESSION_ID_SIZE]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "[7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7]");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_flags_bit_positions_match_wire_contract() {
        assert_eq!(Flags::MOREBITS.bits(), 0b00001);
        assert_eq!(Flags::ACCEPT.bits(), 0b00010);
        assert_eq!(Flags::ACK.bits(), 0b00100);
        assert_eq!(Flags::REVIVE.bits(), 0b01000);
        assert_eq!(Flags::CONNECT.bits(), 0b10000);
    }

    #[test]
    fn test_flags_describe_orders_from_connect_down() {
        let f = Flags::ACK | Flags::CONNECT | Flags::REVIVE;
        assert_eq!(f.describe(), "CONNECT|REVIVE|ACK");
        assert_eq!(Flags::empty().describe(), "-");
    }

    #[test]
    fn test_message_has_requires_all_flags() {
        let msg = Message::with_flags(Flags::ACCEPT);
        assert!(msg.has(Flags::ACCEPT));
        assert!(!msg.has(Flags::ACCEPT | Flags::ACK));
    }
}
