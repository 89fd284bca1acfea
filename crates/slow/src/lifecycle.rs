//! Connection lifecycle: handshake, revive and disconnect.
//!
//! Each exchange is one request followed by a wait for the peer's answer:
//!
//! ```text
//!   Idle ──establish──→ Connecting ──ACCEPT──→ Established
//!    ↑                      │                      │
//!    └──── no ACCEPT ───────┘                      │
//!    ↑                                             │
//!    └────────────── disconnect (ACK) ─────────────┘
//!
//!   Idle (with id) ──revive──→ Connecting ──accepted──→ Established
//! ```
//!
//! The wait polls [`TransportEngine::receive`], so the request itself is
//! retransmitted by the engine while nothing comes back. The first
//! message to arrive decides the outcome. If nothing arrives, the wait
//! ends once the engine gives up on the request or its reply budget runs
//! out, even when older data is still queued ahead of the request.

use std::net::SocketAddr;

use slow_protocol::{Flags, Message};
use slow_session::{ConnectionState, Session};
use slow_transport::{DatagramSocket, TransportEngine};
use tracing::{debug, info, warn};

use crate::SlowError;

/// Marker payload carried by a revive request.
const REVIVE_MARKER: &[u8] = b"revive";

/// Which answer flags count as accepting a revive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevivePolicy {
    /// The answer must carry both ACCEPT and ACK.
    RequireAcceptAndAck,
    /// Either ACCEPT or ACK is enough.
    AcceptOrAck,
}

/// The revive policy used unless a client is configured otherwise.
pub const REVIVE_ACCEPTANCE: RevivePolicy = RevivePolicy::RequireAcceptAndAck;

impl RevivePolicy {
    /// Returns `true` if an answer with `flags` accepts the revive.
    pub fn accepts(self, flags: Flags) -> bool {
        match self {
            Self::RequireAcceptAndAck => flags.contains(Flags::ACCEPT | Flags::ACK),
            Self::AcceptOrAck => flags.intersects(Flags::ACCEPT | Flags::ACK),
        }
    }
}

impl Default for RevivePolicy {
    fn default() -> Self {
        REVIVE_ACCEPTANCE
    }
}

/// Opens a new session with the peer at `dest`.
///
/// Sends a bare CONNECT advertising the local window and waits for an
/// ACCEPT. On success the session adopts the peer's id, sequence number,
/// window and TTL, becomes [`ConnectionState::Established`], and a bare
/// ACK confirms it to the peer.
///
/// # Errors
/// [`SlowError::HandshakeRejected`] if the answer lacks ACCEPT or never
/// comes. The session is left [`ConnectionState::Idle`].
pub async fn establish<S: DatagramSocket>(
    engine: &mut TransportEngine<S>,
    dest: SocketAddr,
    session: &mut Session,
) -> Result<(), SlowError> {
    let result = handshake(engine, dest, session).await;
    if result.is_err() {
        session.state = ConnectionState::Idle;
    }
    result
}

async fn handshake<S: DatagramSocket>(
    engine: &mut TransportEngine<S>,
    dest: SocketAddr,
    session: &mut Session,
) -> Result<(), SlowError> {
    reset_in_flight(engine, session);
    session.state = ConnectionState::Connecting;

    let request = Message {
        flags: Flags::CONNECT,
        window: session.local_window,
        ..Message::default()
    };
    info!(%dest, window = request.window, "connecting");
    engine.send(dest, &request, session).await?;

    let reply = match await_reply(engine, dest, session, request.seq).await? {
        Some(reply) if reply.has(Flags::ACCEPT) => reply,
        Some(reply) => {
            warn!(%dest, flags = %reply.flags.describe(), "handshake rejected");
            return Err(SlowError::HandshakeRejected(format!(
                "peer answered {} without ACCEPT",
                reply.flags.describe()
            )));
        }
        None => {
            warn!(%dest, "handshake timed out");
            return Err(SlowError::HandshakeRejected(
                "no answer from peer".to_string(),
            ));
        }
    };

    session.session_id = reply.session_id;
    session.local_seq = reply.seq.wrapping_add(1);
    session.peer_seq = reply.seq;
    session.peer_window = u32::from(reply.window);
    session.session_ttl = reply.session_ttl;
    reset_in_flight(engine, session);
    session.state = ConnectionState::Established;

    info!(
        session_id = %session.session_id,
        peer_seq = session.peer_seq,
        window = session.peer_window,
        ttl = session.session_ttl,
        "session established"
    );

    let ack = session.control_message(Flags::ACK);
    engine.send(dest, &ack, session).await?;
    Ok(())
}

/// Resumes the session whose id `session` already holds.
///
/// Sends REVIVE|ACK with the session id and a small marker payload. An
/// answer that `policy` accepts re-establishes the session, mirroring the
/// peer's sequence number, window and TTL. Anything still queued from
/// before the revive is discarded.
///
/// # Errors
/// - [`SlowError::NoSession`] — no id to revive
/// - [`SlowError::ReviveRejected`] — the answer was refused by `policy`
///   or never came; the session is left [`ConnectionState::Idle`]
pub async fn revive<S: DatagramSocket>(
    engine: &mut TransportEngine<S>,
    dest: SocketAddr,
    session: &mut Session,
    policy: RevivePolicy,
) -> Result<(), SlowError> {
    if !session.has_id() {
        return Err(SlowError::NoSession);
    }

    let result = resume(engine, dest, session, policy).await;
    if result.is_err() {
        session.state = ConnectionState::Idle;
    }
    result
}

async fn resume<S: DatagramSocket>(
    engine: &mut TransportEngine<S>,
    dest: SocketAddr,
    session: &mut Session,
    policy: RevivePolicy,
) -> Result<(), SlowError> {
    reset_in_flight(engine, session);
    session.state = ConnectionState::Connecting;

    session.next_seq();
    let mut request = session.control_message(Flags::REVIVE | Flags::ACK);
    request.payload = REVIVE_MARKER.to_vec();

    info!(%dest, session_id = %session.session_id, seq = request.seq, "reviving");
    engine.send(dest, &request, session).await?;

    let reply = match await_reply(engine, dest, session, request.seq).await? {
        Some(reply) if policy.accepts(reply.flags) => reply,
        Some(reply) => {
            warn!(%dest, flags = %reply.flags.describe(), ?policy, "revive rejected");
            return Err(SlowError::ReviveRejected(format!(
                "peer answered {}",
                reply.flags.describe()
            )));
        }
        None => {
            warn!(%dest, "revive timed out");
            return Err(SlowError::ReviveRejected("no answer from peer".to_string()));
        }
    };

    session.peer_seq = reply.seq;
    session.peer_window = u32::from(reply.window);
    session.session_ttl = reply.session_ttl;
    reset_in_flight(engine, session);
    session.state = ConnectionState::Established;

    info!(
        session_id = %session.session_id,
        peer_seq = session.peer_seq,
        window = session.peer_window,
        "session revived"
    );
    Ok(())
}

/// Tears the session down.
///
/// Sends CONNECT|REVIVE|ACK and waits for any answer carrying ACK. The
/// session id is kept so the session can be revived later.
///
/// # Errors
/// [`SlowError::DisconnectUnacknowledged`] if no ACK comes back; the
/// session is left as it was.
pub async fn disconnect<S: DatagramSocket>(
    engine: &mut TransportEngine<S>,
    dest: SocketAddr,
    session: &mut Session,
) -> Result<(), SlowError> {
    session.next_seq();
    let request = session.control_message(Flags::CONNECT | Flags::REVIVE | Flags::ACK);

    info!(%dest, session_id = %session.session_id, seq = request.seq, "disconnecting");
    engine.send(dest, &request, session).await?;

    match await_reply(engine, dest, session, request.seq).await? {
        Some(reply) if reply.has(Flags::ACK) => {
            reset_in_flight(engine, session);
            session.state = ConnectionState::Idle;
            info!(session_id = %session.session_id, "disconnected");
            Ok(())
        }
        Some(reply) => {
            warn!(flags = %reply.flags.describe(), "disconnect answered without ACK");
            Err(SlowError::DisconnectUnacknowledged)
        }
        None => {
            warn!("disconnect timed out");
            Err(SlowError::DisconnectUnacknowledged)
        }
    }
}

/// Waits for the answer to the request sent as `request_seq`.
///
/// The wait is bounded by [`TransportEngine::reply_budget`]. Data the peer
/// sends in the meantime still advances the acknowledgment we echo.
async fn await_reply<S: DatagramSocket>(
    engine: &mut TransportEngine<S>,
    dest: SocketAddr,
    session: &mut Session,
    request_seq: u32,
) -> Result<Option<Message>, SlowError> {
    let Some(reply) = engine.await_reply(dest, session, request_seq).await? else {
        return Ok(None);
    };
    debug!(
        seq = reply.seq,
        flags = %reply.flags.describe(),
        len = reply.payload.len(),
        "lifecycle reply"
    );
    if !reply.payload.is_empty() {
        session.observe_peer_seq(reply.seq);
    }
    Ok(Some(reply))
}

/// Zeroes the in-flight count together with the queue that backs it.
fn reset_in_flight<S: DatagramSocket>(engine: &mut TransportEngine<S>, session: &mut Session) {
    engine.clear_pending();
    session.bytes_in_flight = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_policy_requires_both_flags() {
        let policy = RevivePolicy::RequireAcceptAndAck;
        assert!(!policy.accepts(Flags::ACCEPT));
        assert!(!policy.accepts(Flags::ACK));
        assert!(policy.accepts(Flags::ACCEPT | Flags::ACK));
        assert!(policy.accepts(Flags::ACCEPT | Flags::ACK | Flags::MOREBITS));
    }

    #[test]
    fn test_lenient_policy_takes_either_flag() {
        let policy = RevivePolicy::AcceptOrAck;
        assert!(policy.accepts(Flags::ACCEPT));
        assert!(policy.accepts(Flags::ACK));
        assert!(!policy.accepts(Flags::REVIVE));
        assert!(!policy.accepts(Flags::empty()));
    }

    #[test]
    fn test_default_policy_is_strict() {
        assert_eq!(RevivePolicy::default(), RevivePolicy::RequireAcceptAndAck);
        assert_eq!(REVIVE_ACCEPTANCE, RevivePolicy::RequireAcceptAndAck);
    }
}
