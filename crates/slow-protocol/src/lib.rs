//! Wire protocol for SLOW.
//!
//! This crate defines what a single SLOW datagram looks like:
//!
//! - **Types** ([`Message`], [`Flags`], [`SessionId`]) — the in-memory
//!   form of one datagram.
//! - **Codec** ([`encode`], [`decode`]) — the exact little-endian byte
//!   layout used on the wire.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while converting.
//!
//! # Architecture
//!
//! The protocol layer is pure: no sockets, no clocks, no session state.
//! Everything above it (session bookkeeping, the transport engine, the
//! handshake) speaks in terms of [`Message`].
//!
//! ```text
//! Transport (datagrams) → Protocol (Message) → Session / Lifecycle
//! ```
//!
//! # Wire format
//!
//! ```text
//! offset size field
//!  0     16   session id
//! 16      4   bits 0-4 flags, bits 5-31 session ttl (LE)
//! 20      4   seq (LE)
//! 24      4   ack (LE)
//! 28      2   window (LE)
//! 30      1   fragment id
//! 31      1   fragment offset
//! 32  ≤1440   payload
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode, encode};
pub use error::ProtocolError;
pub use types::{Flags, Message, SessionId};

/// Default UDP port of a SLOW peer.
pub const SLOW_PORT: u16 = 7033;

/// Size of the fixed header that precedes every payload.
pub const HEADER_SIZE: usize = 32;

/// Largest payload a single datagram may carry.
pub const MAX_DATA: usize = 1440;

/// Largest encoded datagram: header plus a full payload.
pub const MAX_PACKET: usize = HEADER_SIZE + MAX_DATA;

/// Length of a session identifier in bytes.
pub const SESSION_ID_SIZE: usize = 16;

/// Largest session time-to-live representable in the 27-bit wire field.
pub const MAX_SESSION_TTL: u32 = (1 << 27) - 1;
