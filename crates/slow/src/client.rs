//! `SlowClient` builder and façade.
//!
//! Ties the layers together: one [`TransportEngine`] and one [`Session`]
//! owned by the caller's task, plus the peer address every call targets.

use std::net::{Ipv4Addr, SocketAddr};

use slow_protocol::{Flags, Message, SLOW_PORT};
use slow_session::{Session, SessionConfig};
use slow_transport::{
    CloseHandle, DatagramSocket, LostMessage, SendOutcome, TransportConfig, TransportEngine,
    TransportStats, UdpDatagramSocket,
};
use tracing::debug;

use crate::lifecycle::{self, RevivePolicy};
use crate::SlowError;

/// Everything needed to start a client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Local address to bind. Port 0 lets the OS choose.
    pub bind_addr: SocketAddr,
    /// The peer every operation talks to.
    pub remote: SocketAddr,
    /// Which answers accept a revive.
    pub revive_policy: RevivePolicy,
    /// Transport tuning.
    pub transport: TransportConfig,
    /// Initial session parameters.
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: (Ipv4Addr::UNSPECIFIED, 0).into(),
            remote: (Ipv4Addr::LOCALHOST, SLOW_PORT).into(),
            revive_policy: RevivePolicy::default(),
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Builder for configuring and starting a [`SlowClient`].
///
/// # Example
///
/// ```rust,ignore
/// let client = SlowClient::builder()
///     .remote("198.51.100.7:7033".parse()?)
///     .resume(slow_session::store::load("session.json")?)
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct SlowClientBuilder {
    config: ClientConfig,
    session: Option<Session>,
}

impl SlowClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local address to bind.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Sets the peer address.
    pub fn remote(mut self, addr: SocketAddr) -> Self {
        self.config.remote = addr;
        self
    }

    /// Sets the revive acceptance policy.
    pub fn revive_policy(mut self, policy: RevivePolicy) -> Self {
        self.config.revive_policy = policy;
        self
    }

    /// Sets the transport configuration.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.config.transport = config;
        self
    }

    /// Sets the session configuration used for a fresh session.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Starts from an existing session, typically one restored with
    /// [`slow_session::store::load`], so it can be revived.
    pub fn resume(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Binds the UDP socket and returns the client.
    pub async fn build(self) -> Result<SlowClient, SlowError> {
        let engine =
            TransportEngine::bind(self.config.bind_addr, self.config.transport.clone()).await?;
        Ok(SlowClient::from_engine(engine, self.config, self.session))
    }
}

/// A client endpoint of one SLOW session.
///
/// All operations take `&mut self`: the engine, the session and the
/// retransmission queue have a single owner, and nothing runs in the
/// background. Keep calling [`receive`](Self::receive) to keep
/// acknowledgments and retransmissions moving.
pub struct SlowClient<S: DatagramSocket = UdpDatagramSocket> {
    engine: TransportEngine<S>,
    session: Session,
    remote: SocketAddr,
    revive_policy: RevivePolicy,
}

impl SlowClient {
    /// Creates a new builder.
    pub fn builder() -> SlowClientBuilder {
        SlowClientBuilder::new()
    }
}

impl<S: DatagramSocket> SlowClient<S> {
    /// Creates a client over an already bound socket.
    pub fn with_socket(socket: S, config: ClientConfig) -> Self {
        let engine = TransportEngine::new(socket, config.transport.clone());
        Self::from_engine(engine, config, None)
    }

    fn from_engine(engine: TransportEngine<S>, config: ClientConfig, session: Option<Session>) -> Self {
        let session = session.unwrap_or_else(|| Session::new(&config.session));
        Self {
            engine,
            session,
            remote: config.remote,
            revive_policy: config.revive_policy,
        }
    }

    /// Opens a new session. See [`lifecycle::establish`].
    pub async fn establish(&mut self) -> Result<(), SlowError> {
        lifecycle::establish(&mut self.engine, self.remote, &mut self.session).await
    }

    /// Resumes the current session id. See [`lifecycle::revive`].
    pub async fn revive(&mut self) -> Result<(), SlowError> {
        lifecycle::revive(
            &mut self.engine,
            self.remote,
            &mut self.session,
            self.revive_policy,
        )
        .await
    }

    /// Tears the session down. See [`lifecycle::disconnect`].
    pub async fn disconnect(&mut self) -> Result<(), SlowError> {
        lifecycle::disconnect(&mut self.engine, self.remote, &mut self.session).await
    }

    /// Sends `payload` as one application message.
    ///
    /// Payloads above the datagram limit are fragmented; check
    /// [`SendOutcome::is_partial`] for a window stall part-way through.
    /// If nothing was sent the sequence counter is left untouched, so the
    /// identical send can simply be retried.
    pub async fn send(&mut self, payload: impl Into<Vec<u8>>) -> Result<SendOutcome, SlowError> {
        if !self.session.is_established() {
            return Err(SlowError::NotEstablished);
        }

        let previous = self.session.local_seq;
        let message = self.session.data_message(payload.into());
        match self.engine.send(self.remote, &message, &mut self.session).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if !e.is_socket_failure() {
                    self.session.local_seq = previous;
                }
                Err(e.into())
            }
        }
    }

    /// Sends `payload`, waiting for the window to open if needed.
    ///
    /// Each time the send is refused for flow control, one
    /// [`receive`](Self::receive) is polled to drain acknowledgments,
    /// up to `max_polls` times. Messages received meanwhile are dropped.
    pub async fn send_when_ready(
        &mut self,
        payload: &[u8],
        max_polls: usize,
    ) -> Result<SendOutcome, SlowError> {
        let mut polls = 0;
        loop {
            match self.send(payload).await {
                Err(e) if e.is_flow_blocked() && polls < max_polls => {
                    polls += 1;
                    if let Some(message) = self.receive().await? {
                        debug!(
                            seq = message.seq,
                            len = message.payload.len(),
                            "discarding message while waiting for window"
                        );
                    }
                }
                other => return other,
            }
        }
    }

    /// Waits a bounded time for one message from the peer.
    ///
    /// `Ok(None)` means nothing (valid) arrived. Messages carrying data
    /// advance the acknowledgment this client echoes.
    pub async fn receive(&mut self) -> Result<Option<Message>, SlowError> {
        let message = self.engine.receive(self.remote, &mut self.session).await?;
        if let Some(message) = &message {
            if !message.payload.is_empty() {
                self.session.observe_peer_seq(message.seq);
            }
        }
        Ok(message)
    }

    /// Sends a bare ACK reflecting the session: current sequence number,
    /// acknowledgment of the peer and the local window.
    pub async fn acknowledge(&mut self) -> Result<(), SlowError> {
        let ack = self.session.control_message(Flags::ACK);
        self.engine.send(self.remote, &ack, &mut self.session).await?;
        Ok(())
    }

    /// Returns `true` while data may be sent.
    pub fn is_established(&self) -> bool {
        self.session.is_established()
    }

    /// The session state, for display or persistence.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The peer address.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// The local socket address.
    pub fn local_addr(&self) -> Result<SocketAddr, SlowError> {
        Ok(self.engine.local_addr()?)
    }

    /// Transport counters.
    pub fn stats(&self) -> &TransportStats {
        self.engine.stats()
    }

    /// Messages abandoned at the retry ceiling since the last call.
    pub fn take_losses(&mut self) -> Vec<LostMessage> {
        self.engine.take_losses()
    }

    /// A handle that can close this client from another task.
    pub fn close_handle(&self) -> CloseHandle {
        self.engine.close_handle()
    }

    /// Releases the socket. Later operations fail with `Closed`.
    pub fn close(&mut self) {
        self.engine.close();
    }
}
