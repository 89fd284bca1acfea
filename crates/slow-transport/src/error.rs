use slow_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Creating or binding the socket failed.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Querying the socket's local address failed.
    #[error("local address unavailable: {0}")]
    LocalAddr(#[source] std::io::Error),

    /// Transmitting a datagram failed.
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    /// Reading a datagram failed.
    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),

    /// The peer window has no room for this payload.
    ///
    /// Nothing was sent. Drain acknowledgments with `receive` and retry
    /// the identical send.
    #[error("flow control: {requested} bytes do not fit ({in_flight} in flight, window {window})")]
    FlowControlBlocked {
        /// Bytes already in flight.
        in_flight: u32,
        /// Payload bytes the caller tried to send.
        requested: usize,
        /// Current peer window.
        window: u32,
    },

    /// The message would need more fragments than the 8-bit ordinal allows.
    #[error("message of {len} bytes exceeds the {max}-byte fragmentation limit")]
    MessageTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Largest payload that can be fragmented.
        max: usize,
    },

    /// Encoding an outgoing message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The engine was closed.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Returns `true` for socket-level failures, which are fatal to the
    /// engine.
    pub fn is_socket_failure(&self) -> bool {
        matches!(
            self,
            Self::Bind(_) | Self::LocalAddr(_) | Self::Send(_) | Self::Receive(_)
        )
    }
}
