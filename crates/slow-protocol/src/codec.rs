//! Encoding and decoding of SLOW datagrams.
//!
//! All multi-byte integers are little-endian. This is part of the wire
//! contract with existing peers and must not change.
//!
//! Flags and session TTL share one 32-bit word:
//!
//! ```text
//! word = (session_ttl << 5) | flags
//! ```
//!
//! Outside the codec the two are always separate typed fields.

use crate::{Flags, HEADER_SIZE, MAX_DATA, MAX_SESSION_TTL, Message, ProtocolError, SESSION_ID_SIZE, SessionId};

// Byte offsets of each field within the fixed header.
const OFF_SESSION_ID: usize = 0;
const OFF_PACKED: usize = 16;
const OFF_SEQ: usize = 20;
const OFF_ACK: usize = 24;
const OFF_WINDOW: usize = 28;
const OFF_FRAGMENT_ID: usize = 30;
const OFF_FRAGMENT_OFFSET: usize = 31;

/// Serialises `message` into a newly allocated buffer of exactly
/// `HEADER_SIZE + payload.len()` bytes.
///
/// A session TTL wider than 27 bits is truncated to fit the field.
///
/// # Errors
/// Returns [`ProtocolError::PayloadTooLarge`] if the payload is longer than
/// [`MAX_DATA`]; the caller must fragment first.
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload_len = message.payload.len();
    if payload_len > MAX_DATA {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload_len,
            max: MAX_DATA,
        });
    }

    let mut buf = vec![0u8; HEADER_SIZE + payload_len];

    buf[OFF_SESSION_ID..OFF_SESSION_ID + SESSION_ID_SIZE]
        .copy_from_slice(message.session_id.as_bytes());

    let packed = ((message.session_ttl & MAX_SESSION_TTL) << 5)
        | (u32::from(message.flags.bits()) & Flags::WIRE_MASK);
    buf[OFF_PACKED..OFF_PACKED + 4].copy_from_slice(&packed.to_le_bytes());
    buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&message.seq.to_le_bytes());
    buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&message.ack.to_le_bytes());
    buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&message.window.to_le_bytes());
    buf[OFF_FRAGMENT_ID] = message.fragment_id;
    buf[OFF_FRAGMENT_OFFSET] = message.fragment_offset;

    buf[HEADER_SIZE..].copy_from_slice(&message.payload);

    Ok(buf)
}

/// Parses a datagram into a [`Message`].
///
/// Every byte after the header becomes the payload, which may be empty.
///
/// # Errors
/// Returns [`ProtocolError::Malformed`] if `buf` is shorter than
/// [`HEADER_SIZE`].
pub fn decode(buf: &[u8]) -> Result<Message, ProtocolError> {
    if buf.len() < HEADER_SIZE {
        return Err(ProtocolError::Malformed { len: buf.len() });
    }

    let mut session_id = [0u8; SESSION_ID_SIZE];
    session_id.copy_from_slice(&buf[OFF_SESSION_ID..OFF_SESSION_ID + SESSION_ID_SIZE]);

    let packed = read_u32(buf, OFF_PACKED);
    let flags = Flags::from_bits_truncate((packed & Flags::WIRE_MASK) as u8);

    Ok(Message {
        session_id: SessionId(session_id),
        flags,
        session_ttl: packed >> 5,
        seq: read_u32(buf, OFF_SEQ),
        ack: read_u32(buf, OFF_ACK),
        window: u16::from_le_bytes([buf[OFF_WINDOW], buf[OFF_WINDOW + 1]]),
        fragment_id: buf[OFF_FRAGMENT_ID],
        fragment_offset: buf[OFF_FRAGMENT_OFFSET],
        payload: buf[HEADER_SIZE..].to_vec(),
    })
}

/// Reads a little-endian `u32` at `off`. The caller has checked the length.
fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(payload: &[u8]) -> Message {
        Message {
            session_id: SessionId([0x11; SESSION_ID_SIZE]),
            flags: Flags::ACK | Flags::MOREBITS,
            session_ttl: 0x0123_4567,
            seq: 0x0102_0304,
            ack: 0x0506_0708,
            window: 0x0A0B,
            fragment_id: 0xC1,
            fragment_offset: 2,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_encode_decode_roundtrip_preserves_every_field() {
        let msg = sample(b"hello slow");
        let decoded = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_encode_decode_roundtrip_sweeps_flags_ttl_and_payload_edges() {
        for bits in 0..=Flags::WIRE_MASK as u8 {
            let flags = Flags::from_bits_truncate(bits);
            for session_ttl in [0, 1, MAX_SESSION_TTL] {
                for len in [0, 1, MAX_DATA - 1, MAX_DATA] {
                    let msg = Message {
                        flags,
                        session_ttl,
                        payload: vec![0xA5; len],
                        ..sample(b"")
                    };
                    let bytes = encode(&msg).unwrap();
                    assert_eq!(bytes.len(), HEADER_SIZE + len);
                    assert_eq!(
                        decode(&bytes).unwrap(),
                        msg,
                        "flags {bits:#07b}, ttl {session_ttl}, len {len}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_encode_decode_roundtrip_max_payload() {
        let msg = sample(&[0x5A; MAX_DATA]);
        let bytes = encode(&msg).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + MAX_DATA);
        assert_eq!(decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_encode_empty_payload_is_header_only() {
        let bytes = encode(&Message::with_flags(Flags::CONNECT)).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.payload.is_empty());
        assert_eq!(decoded.flags, Flags::CONNECT);
    }

    #[test]
    fn test_encode_oversized_payload_returns_error() {
        let msg = sample(&[0; MAX_DATA + 1]);
        assert_eq!(
            encode(&msg),
            Err(ProtocolError::PayloadTooLarge {
                len: MAX_DATA + 1,
                max: MAX_DATA
            })
        );
    }

    #[test]
    fn test_encode_fields_are_little_endian_at_fixed_offsets() {
        let bytes = encode(&sample(b"")).unwrap();
        assert_eq!(&bytes[OFF_SEQ..OFF_SEQ + 4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[OFF_ACK..OFF_ACK + 4], &[0x08, 0x07, 0x06, 0x05]);
        assert_eq!(&bytes[OFF_WINDOW..OFF_WINDOW + 2], &[0x0B, 0x0A]);
        assert_eq!(bytes[OFF_FRAGMENT_ID], 0xC1);
        assert_eq!(bytes[OFF_FRAGMENT_OFFSET], 2);
        assert_eq!(&bytes[..16], &[0x11; 16]);
    }

    #[test]
    fn test_encode_packs_flags_low_and_ttl_high() {
        let msg = Message {
            flags: Flags::CONNECT | Flags::ACK,
            session_ttl: 3,
            ..Message::default()
        };
        let bytes = encode(&msg).unwrap();
        let word = read_u32(&bytes, OFF_PACKED);
        assert_eq!(word & 0x1F, 0b10100);
        assert_eq!(word >> 5, 3);
        // (3 << 5) | 0b10100 = 0x74
        assert_eq!(&bytes[OFF_PACKED..OFF_PACKED + 4], &[0x74, 0, 0, 0]);
    }

    #[test]
    fn test_encode_truncates_ttl_to_27_bits() {
        let msg = Message {
            session_ttl: u32::MAX,
            ..Message::default()
        };
        let decoded = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(decoded.session_ttl, MAX_SESSION_TTL);
        assert!(decoded.flags.is_empty());
    }

    #[test]
    fn test_decode_every_short_buffer_is_malformed() {
        let buf = [0u8; HEADER_SIZE];
        for len in 0..HEADER_SIZE {
            assert_eq!(
                decode(&buf[..len]),
                Err(ProtocolError::Malformed { len }),
                "length {len} must be rejected"
            );
        }
    }

    #[test]
    fn test_decode_exact_header_yields_empty_payload() {
        let msg = decode(&[0u8; HEADER_SIZE]).unwrap();
        assert_eq!(msg, Message::default());
    }

    #[test]
    fn test_decode_trailing_bytes_become_payload() {
        let mut bytes = encode(&Message::with_flags(Flags::ACK)).unwrap();
        bytes.extend_from_slice(b"tail");
        assert_eq!(decode(&bytes).unwrap().payload, b"tail");
    }
}
