//! Unified error type for the SLOW client.

use slow_protocol::ProtocolError;
use slow_session::SessionError;
use slow_transport::TransportError;

/// Top-level error that wraps the layer errors plus lifecycle failures.
///
/// The `#[from]` attribute on each wrapping variant lets `?` convert
/// layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SlowError {
    /// A transport-level error (socket, flow control, closed).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session persistence error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The peer did not accept the connection.
    ///
    /// The session is back in `Idle`; `establish` may be retried.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// The peer did not accept the revive.
    ///
    /// Retry, or fall back to `establish`.
    #[error("revive rejected: {0}")]
    ReviveRejected(String),

    /// Revive needs a session id from an earlier handshake.
    #[error("no session to revive")]
    NoSession,

    /// Data can only be sent on an established session.
    #[error("session not established")]
    NotEstablished,

    /// No acknowledgment arrived for the disconnect request.
    #[error("disconnect not acknowledged")]
    DisconnectUnacknowledged,
}

impl SlowError {
    /// Returns `true` if the send was refused because the peer window is
    /// full.
    pub fn is_flow_blocked(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::FlowControlBlocked { .. })
        )
    }
}
