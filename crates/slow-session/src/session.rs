//! Session types: the record of one connection to a SLOW peer.
//!
//! A [`Session`] is plain data. The application loop owns it and lends it
//! by `&mut` to every transport and lifecycle call; nothing in the stack
//! keeps a reference to it between calls.

use serde::{Deserialize, Serialize};
use slow_protocol::{Flags, Message, SessionId};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for a new session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bytes this endpoint is willing to receive, advertised in every
    /// outgoing message.
    ///
    /// Default: 7200.
    pub local_window: u16,

    /// Peer window assumed until the peer advertises one.
    ///
    /// Default: 1024, small enough to be safe before the handshake.
    pub initial_peer_window: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_window: 7200,
            initial_peer_window: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
///
/// ```text
///   Idle ──(establish)──→ Connecting ──(ACCEPT)──→ Established
///    ↑                        │                         │
///    └──────(rejected)────────┘                         │
///    ↑                                                  │
///    └──────────────────(disconnect)────────────────────┘
///    │
///    └──(revive)──→ Connecting ──(ACCEPT|ACK)──→ Established
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No live connection. A session id may still be known for revive.
    #[default]
    Idle,
    /// A connect or revive request is outstanding.
    Connecting,
    /// The handshake completed; data messages may be exchanged.
    Established,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The state of one SLOW connection.
///
/// `bytes_in_flight <= peer_window` must hold before a new payload is
/// admitted for transmission; the transport engine is the only place that
/// adds to `bytes_in_flight`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Peer-issued id, [`SessionId::NIL`] until the handshake completes.
    pub session_id: SessionId,
    /// Sequence number of the last message this endpoint sent.
    pub local_seq: u32,
    /// Last sequence number observed from the peer; echoed as `ack`.
    pub peer_seq: u32,
    /// Time-to-live mirrored from the peer. Never computed locally.
    pub session_ttl: u32,
    /// Window advertised to the peer.
    pub local_window: u16,
    /// Window last advertised by the peer.
    pub peer_window: u32,
    /// Payload bytes sent and not yet cumulatively acknowledged.
    pub bytes_in_flight: u32,
    /// Lifecycle position.
    pub state: ConnectionState,
}

impl Session {
    /// Creates an idle session with no id.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            session_id: SessionId::NIL,
            local_seq: 0,
            peer_seq: 0,
            session_ttl: 0,
            local_window: config.local_window,
            peer_window: config.initial_peer_window,
            bytes_in_flight: 0,
            state: ConnectionState::Idle,
        }
    }

    /// Returns `true` while data messages may be exchanged.
    pub fn is_established(&self) -> bool {
        self.state == ConnectionState::Established
    }

    /// Returns `true` if a peer has ever issued an id for this session.
    pub fn has_id(&self) -> bool {
        !self.session_id.is_nil()
    }

    /// Advances the local sequence counter and returns the new value.
    pub fn next_seq(&mut self) -> u32 {
        self.local_seq = self.local_seq.wrapping_add(1);
        self.local_seq
    }

    /// Records a sequence number seen from the peer.
    ///
    /// The counter never moves backwards, so a late retransmission from
    /// the peer cannot rewind the acknowledgment we echo.
    pub fn observe_peer_seq(&mut self, seq: u32) {
        if seq > self.peer_seq {
            self.peer_seq = seq;
        }
    }

    /// Bytes that may still be sent before the peer window is full.
    pub fn free_window(&self) -> u32 {
        self.peer_window.saturating_sub(self.bytes_in_flight)
    }

    /// Returns `true` if a payload of `len` bytes fits in the peer window.
    pub fn admits(&self, len: usize) -> bool {
        u64::from(self.bytes_in_flight) + len as u64 <= u64::from(self.peer_window)
    }

    /// Accounts `len` newly transmitted payload bytes.
    pub fn reserve(&mut self, len: usize) {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        self.bytes_in_flight = self.bytes_in_flight.saturating_add(len);
    }

    /// Releases `len` acknowledged or abandoned payload bytes.
    pub fn release(&mut self, len: usize) {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(len);
    }

    /// Builds a header-only message that reflects this session: id,
    /// current sequence number, `ack = peer_seq`, local window and TTL.
    ///
    /// The sequence counter is not advanced.
    pub fn control_message(&self, flags: Flags) -> Message {
        Message {
            session_id: self.session_id,
            flags,
            session_ttl: self.session_ttl,
            seq: self.local_seq,
            ack: self.peer_seq,
            window: self.local_window,
            fragment_id: 0,
            fragment_offset: 0,
            payload: Vec::new(),
        }
    }

    /// Builds a data message for `payload`, advancing the sequence counter.
    ///
    /// Data always piggybacks an acknowledgment of the peer's stream.
    pub fn data_message(&mut self, payload: Vec<u8>) -> Message {
        self.next_seq();
        Message {
            payload,
            ..self.control_message(Flags::ACK)
        }
    }
}
