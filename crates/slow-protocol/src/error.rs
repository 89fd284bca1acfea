//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. A
//! `ProtocolError` always means the bytes (or the message about to become
//! bytes) are wrong, never that the network misbehaved.

/// Errors that can occur while encoding or decoding a datagram.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The buffer is shorter than the fixed 32-byte header.
    ///
    /// The transport discards such datagrams instead of failing the
    /// session.
    #[error("malformed packet: {len} bytes is shorter than the {}-byte header", crate::HEADER_SIZE)]
    Malformed {
        /// Length of the rejected buffer.
        len: usize,
    },

    /// The payload does not fit into a single datagram.
    ///
    /// Oversized application messages must be fragmented before they
    /// reach the codec.
    #[error("payload of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge {
        /// Length of the offending payload.
        len: usize,
        /// Maximum accepted payload length.
        max: usize,
    },
}
