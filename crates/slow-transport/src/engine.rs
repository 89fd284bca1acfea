//! The transport engine: send, receive, and retransmission.
//!
//! One [`TransportEngine`] owns one socket and the queue of datagrams
//! awaiting acknowledgment. The caller's [`Session`] is lent to every
//! call, and the engine updates its window accounting in place:
//!
//! ```text
//!   send ──tick──→ admit against peer window ──→ encode ──→ socket
//!                          │                               │
//!                          └── fragment if > max_data ─────┘
//!
//!   receive ──(timeout)──→ tick ──→ Ok(None)
//!      │
//!      └──(datagram)──→ decode ──→ mirror ttl ──→ ACK? evict + window
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use slow_protocol::{Flags, MAX_PACKET, Message};
use slow_session::Session;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::fragment;
use crate::retransmit::Due;
use crate::{
    DatagramSocket, LostMessage, PendingSend, RetransmitQueue, TickOutcome, TransportConfig,
    TransportError,
};

// ---------------------------------------------------------------------------
// Outcomes and counters
// ---------------------------------------------------------------------------

/// Result of a successful [`TransportEngine::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    /// Sequence number of the last datagram actually transmitted.
    pub last_seq: u32,
    /// Datagrams transmitted (1 unless the message was fragmented).
    pub fragments: usize,
    /// Payload bytes transmitted.
    pub bytes_sent: usize,
    /// Payload bytes left unsent because the peer window closed
    /// mid-fragmentation. They are not buffered; resending them is up to
    /// the caller.
    pub unsent: usize,
}

impl SendOutcome {
    /// Returns `true` if part of the payload was not transmitted.
    pub fn is_partial(&self) -> bool {
        self.unsent > 0
    }
}

/// Running counters for one engine. Purely informational.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Datagrams handed to the socket, retransmissions included.
    pub datagrams_sent: u64,
    /// Datagrams read from the socket, malformed ones included.
    pub datagrams_received: u64,
    /// Retransmissions of unacknowledged datagrams.
    pub retransmissions: u64,
    /// Datagrams abandoned at the retry ceiling.
    pub dropped: u64,
    /// Received datagrams shorter than the header.
    pub malformed: u64,
    /// Sends refused because the peer window was full.
    pub flow_blocked: u64,
}

// ---------------------------------------------------------------------------
// CloseHandle
// ---------------------------------------------------------------------------

/// Closes a [`TransportEngine`] from outside the task that drives it.
///
/// Closing wakes a `receive` that is currently waiting; it and every later
/// operation return [`TransportError::Closed`].
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    /// Signals the engine to close. Safe to call any number of times.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once a close has been requested.
    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }
}

// ---------------------------------------------------------------------------
// TransportEngine
// ---------------------------------------------------------------------------

/// Reliable-ish delivery of [`Message`]s over a [`DatagramSocket`].
///
/// The socket is owned for the engine's whole life and released exactly
/// once: by [`close`](Self::close), or when the engine is dropped.
pub struct TransportEngine<S: DatagramSocket> {
    socket: Option<S>,
    config: TransportConfig,
    pending: RetransmitQueue,
    losses: Vec<LostMessage>,
    stats: TransportStats,
    close_tx: Arc<watch::Sender<bool>>,
    close_rx: watch::Receiver<bool>,
}

#[cfg(feature = "udp")]
impl TransportEngine<crate::UdpDatagramSocket> {
    /// Binds a UDP socket to `addr` and wraps it in an engine.
    pub async fn bind(addr: SocketAddr, config: TransportConfig) -> Result<Self, TransportError> {
        let socket = crate::UdpDatagramSocket::bind(addr).await?;
        Ok(Self::new(socket, config))
    }
}

impl<S: DatagramSocket> TransportEngine<S> {
    /// Creates an engine around an already bound socket.
    pub fn new(socket: S, config: TransportConfig) -> Self {
        let (close_tx, close_rx) = watch::channel(false);
        Self {
            socket: Some(socket),
            config: config.validated(),
            pending: RetransmitQueue::new(),
            losses: Vec::new(),
            stats: TransportStats::default(),
            close_tx: Arc::new(close_tx),
            close_rx,
        }
    }

    /// Sends `message` to `dest`.
    ///
    /// Before anything else, the retransmission tick gets a chance to run.
    ///
    /// A payload of at most `max_data` bytes goes out as one datagram, or
    /// not at all if it does not fit in the peer window. A larger payload
    /// is fragmented: piece *k* uses sequence number `message.seq + k`,
    /// and `session.local_seq` ends on the last piece sent. Fragmentation
    /// stops early, without failing, once the window is full; see
    /// [`SendOutcome::unsent`].
    ///
    /// # Errors
    /// - [`TransportError::FlowControlBlocked`] — nothing fit in the window
    /// - [`TransportError::MessageTooLarge`] — more than 256 pieces needed
    /// - socket failures and [`TransportError::Closed`]
    pub async fn send(
        &mut self,
        dest: SocketAddr,
        message: &Message,
        session: &mut Session,
    ) -> Result<SendOutcome, TransportError> {
        self.ensure_open()?;
        self.tick(dest, session).await?;

        if message.payload.len() <= self.config.max_data {
            self.send_unit(dest, message, session).await
        } else {
            self.send_fragmented(dest, message, session).await
        }
    }

    /// Waits up to `recv_timeout` for one datagram.
    ///
    /// - Timeout: runs the retransmission tick and returns `Ok(None)`.
    /// - Malformed datagram: discarded, returns `Ok(None)`.
    /// - Otherwise the session TTL is mirrored; if the message carries ACK,
    ///   every pending datagram with `seq <= ack` is released and the peer
    ///   window is adopted. The message is returned whatever its flags.
    pub async fn receive(
        &mut self,
        dest: SocketAddr,
        session: &mut Session,
    ) -> Result<Option<Message>, TransportError> {
        self.ensure_open()?;

        let mut buf = [0u8; MAX_PACKET];
        let wait = self.config.recv_timeout;
        let waited = {
            let Some(socket) = self.socket.as_ref() else {
                return Err(TransportError::Closed);
            };
            let close_rx = &mut self.close_rx;
            tokio::select! {
                biased;
                _ = close_rx.wait_for(|closed| *closed) => None,
                res = tokio::time::timeout(wait, socket.recv_from(&mut buf)) => Some(res),
            }
        };

        let (len, from) = match waited {
            None => {
                self.close();
                return Err(TransportError::Closed);
            }
            Some(Err(_elapsed)) => {
                self.tick(dest, session).await?;
                return Ok(None);
            }
            Some(Ok(res)) => res?,
        };
        self.stats.datagrams_received += 1;

        let message = match Message::decode(&buf[..len]) {
            Ok(message) => message,
            Err(e) => {
                self.stats.malformed += 1;
                debug!(%from, len, error = %e, "discarding malformed datagram");
                return Ok(None);
            }
        };

        trace!(
            %from,
            seq = message.seq,
            ack = message.ack,
            flags = %message.flags.describe(),
            window = message.window,
            len = message.payload.len(),
            "packet received"
        );

        session.session_ttl = message.session_ttl;

        if message.has(Flags::ACK) {
            let released = self.pending.acknowledge(message.ack);
            session.release(released);
            if released > 0 {
                trace!(
                    ack = message.ack,
                    released,
                    in_flight = session.bytes_in_flight,
                    "acknowledged"
                );
            }

            let window = u32::from(message.window);
            if window != session.peer_window {
                debug!(old = session.peer_window, new = window, "peer window updated");
            }
            session.peer_window = window;
        }

        Ok(Some(message))
    }

    /// Polls [`receive`](Self::receive) for the answer to the request sent
    /// as `request_seq`.
    ///
    /// Returns the first message that arrives. Returns `None` once the
    /// request has been dropped at the retry ceiling, or once
    /// [`reply_budget`](Self::reply_budget) has elapsed, whichever comes
    /// first. The budget does not depend on how many older datagrams sit
    /// ahead of the request in the queue.
    pub async fn await_reply(
        &mut self,
        dest: SocketAddr,
        session: &mut Session,
        request_seq: u32,
    ) -> Result<Option<Message>, TransportError> {
        let deadline = Instant::now() + self.reply_budget();
        loop {
            if let Some(reply) = self.receive(dest, session).await? {
                return Ok(Some(reply));
            }
            if !self.pending.contains(request_seq) {
                return Ok(None);
            }
            if Instant::now() >= deadline {
                debug!(
                    seq = request_seq,
                    queued = self.pending.len(),
                    "no reply within budget"
                );
                return Ok(None);
            }
        }
    }

    /// How long [`await_reply`](Self::await_reply) waits at most: the time
    /// a request at the head of the queue needs to run through every
    /// retry, plus one receive wait.
    pub fn reply_budget(&self) -> std::time::Duration {
        self.config.retry_interval * (self.config.max_tries + 1) + self.config.recv_timeout
    }

    /// Runs one retransmission step against the head of the queue.
    ///
    /// Called automatically from [`send`](Self::send) and from a
    /// [`receive`](Self::receive) timeout. An entry dropped at the retry
    /// ceiling releases its bytes from the session and is recorded for
    /// [`take_losses`](Self::take_losses).
    pub async fn tick(
        &mut self,
        dest: SocketAddr,
        session: &mut Session,
    ) -> Result<TickOutcome, TransportError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(TransportError::Closed);
        };
        let now = Instant::now();

        let seq = match self
            .pending
            .due(now, self.config.retry_interval, self.config.max_tries)
        {
            None => return Ok(TickOutcome::Idle),
            Some(Due::Resend(entry)) => {
                socket.send_to(&entry.raw, dest).await?;
                entry.seq
            }
            Some(Due::Exhausted(entry)) => {
                session.release(entry.payload_size);
                let lost = LostMessage {
                    seq: entry.seq,
                    payload_size: entry.payload_size,
                    attempts: entry.attempts,
                };
                self.stats.dropped += 1;
                self.losses.push(lost);
                warn!(
                    seq = lost.seq,
                    attempts = lost.attempts,
                    released = lost.payload_size,
                    "retransmission limit reached, dropping datagram"
                );
                return Ok(TickOutcome::Dropped(lost));
            }
        };

        let attempt = self.pending.mark_resent(now);
        self.stats.retransmissions += 1;
        self.stats.datagrams_sent += 1;
        debug!(seq, attempt, max_tries = self.config.max_tries, "retransmitted");

        Ok(TickOutcome::Retransmitted { seq, attempt })
    }

    // -- Accessors ---------------------------------------------------------

    /// Returns the address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .as_ref()
            .ok_or(TransportError::Closed)?
            .local_addr()
    }

    /// The validated configuration in use.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Snapshot of the running counters.
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// The datagrams awaiting acknowledgment.
    pub fn pending(&self) -> &RetransmitQueue {
        &self.pending
    }

    /// Returns `true` if the datagram with `seq` is still awaiting
    /// acknowledgment.
    pub fn is_pending(&self, seq: u32) -> bool {
        self.pending.contains(seq)
    }

    /// Forgets every datagram awaiting acknowledgment.
    ///
    /// Used when the session's in-flight accounting is reset wholesale
    /// (handshake, revive, disconnect), so that a late acknowledgment
    /// cannot release the same bytes twice.
    pub fn clear_pending(&mut self) -> usize {
        let n = self.pending.clear();
        if n > 0 {
            debug!(discarded = n, "retransmission queue cleared");
        }
        n
    }

    /// Drains the datagrams dropped at the retry ceiling since the last call.
    pub fn take_losses(&mut self) -> Vec<LostMessage> {
        std::mem::take(&mut self.losses)
    }

    /// A handle that can close this engine from another task.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            tx: Arc::clone(&self.close_tx),
        }
    }

    /// Releases the socket. Idempotent.
    pub fn close(&mut self) {
        self.close_tx.send_replace(true);
        if let Some(socket) = self.socket.take() {
            drop(socket);
            self.pending.clear();
            debug!("transport closed");
        }
    }

    /// Returns `true` once the engine has been closed.
    pub fn is_closed(&self) -> bool {
        self.socket.is_none() || *self.close_rx.borrow()
    }

    // -- Internals ---------------------------------------------------------

    /// Fails with `Closed` if the engine was closed, here or via a handle.
    fn ensure_open(&mut self) -> Result<(), TransportError> {
        if *self.close_rx.borrow() {
            self.close();
        }
        if self.socket.is_none() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    async fn send_unit(
        &mut self,
        dest: SocketAddr,
        message: &Message,
        session: &mut Session,
    ) -> Result<SendOutcome, TransportError> {
        let len = message.payload.len();
        if !session.admits(len) {
            return Err(self.flow_blocked(message.seq, len, session));
        }

        let raw = message.encode()?;
        self.transmit(dest, raw, message, session).await?;

        Ok(SendOutcome {
            last_seq: message.seq,
            fragments: 1,
            bytes_sent: len,
            unsent: 0,
        })
    }

    async fn send_fragmented(
        &mut self,
        dest: SocketAddr,
        message: &Message,
        session: &mut Session,
    ) -> Result<SendOutcome, TransportError> {
        let total = message.payload.len();
        let max_data = self.config.max_data;
        let limit = fragment::max_message_len(max_data);
        if total > limit {
            return Err(TransportError::MessageTooLarge { len: total, max: limit });
        }

        let group = fragment::next_group_id();
        let mut offset = 0;
        let mut count = 0usize;
        let mut seq = message.seq;

        while offset < total {
            let chunk = fragment::chunk_len(max_data, total - offset, session.free_window());
            if chunk == 0 {
                break;
            }
            let Ok(ordinal) = u8::try_from(count) else {
                break;
            };

            let mut flags = message.flags;
            flags.set(Flags::MOREBITS, offset + chunk < total);

            let piece = Message {
                session_id: message.session_id,
                flags,
                session_ttl: message.session_ttl,
                seq,
                ack: message.ack,
                window: message.window,
                fragment_id: group,
                fragment_offset: ordinal,
                payload: message.payload[offset..offset + chunk].to_vec(),
            };
            let raw = piece.encode()?;
            self.transmit(dest, raw, &piece, session).await?;

            session.local_seq = seq;
            offset += chunk;
            count += 1;
            seq = seq.wrapping_add(1);
        }

        if count == 0 {
            return Err(self.flow_blocked(message.seq, total, session));
        }

        let outcome = SendOutcome {
            last_seq: seq.wrapping_sub(1),
            fragments: count,
            bytes_sent: offset,
            unsent: total - offset,
        };
        if outcome.is_partial() {
            warn!(
                fragment_id = group,
                sent = outcome.bytes_sent,
                unsent = outcome.unsent,
                window = session.peer_window,
                "fragmentation stopped: peer window exhausted"
            );
        } else {
            debug!(
                fragment_id = group,
                fragments = count,
                bytes = total,
                "message fragmented"
            );
        }
        Ok(outcome)
    }

    /// Puts `raw` on the wire, accounts its payload, and queues it for
    /// retransmission if it expects an answer.
    async fn transmit(
        &mut self,
        dest: SocketAddr,
        raw: Vec<u8>,
        message: &Message,
        session: &mut Session,
    ) -> Result<(), TransportError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(TransportError::Closed);
        };
        socket.send_to(&raw, dest).await?;
        self.stats.datagrams_sent += 1;

        let len = message.payload.len();
        trace!(
            %dest,
            seq = message.seq,
            ack = message.ack,
            flags = %message.flags.describe(),
            window = message.window,
            fid = message.fragment_id,
            fo = message.fragment_offset,
            len,
            "packet sent"
        );

        session.reserve(len);
        if expects_answer(message) {
            self.pending
                .push(PendingSend::new(raw, message.seq, len, Instant::now()));
        }
        Ok(())
    }

    fn flow_blocked(&mut self, seq: u32, requested: usize, session: &Session) -> TransportError {
        self.stats.flow_blocked += 1;
        debug!(
            seq,
            requested,
            in_flight = session.bytes_in_flight,
            window = session.peer_window,
            "send refused: peer window full"
        );
        TransportError::FlowControlBlocked {
            in_flight: session.bytes_in_flight,
            requested,
            window: session.peer_window,
        }
    }
}

/// Datagrams that carry payload, or that request a connect or revive,
/// are retransmitted until acknowledged. Bare acknowledgments are not.
fn expects_answer(message: &Message) -> bool {
    !message.payload.is_empty() || message.flags.intersects(Flags::CONNECT | Flags::REVIVE)
}
