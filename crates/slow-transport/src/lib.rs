//! Reliable transport engine for SLOW.
//!
//! Provides the [`DatagramSocket`] trait that abstracts over the datagram
//! channel, and [`TransportEngine`], which layers flow control,
//! fragmentation and timeout-driven retransmission on top of it.
//!
//! # Scheduling
//!
//! There is no timer task. Retransmission runs from the two places where
//! the engine already has control: at the start of every `send`, and when
//! a `receive` wait times out. A caller that keeps polling `receive` keeps
//! retries flowing.
//!
//! # Feature Flags
//!
//! - `udp` (default) — [`UdpDatagramSocket`] over `tokio::net::UdpSocket`

#![allow(async_fn_in_trait)]

mod config;
mod engine;
mod error;
mod fragment;
mod retransmit;
#[cfg(test)]
mod testing;
#[cfg(feature = "udp")]
mod udp;

pub use config::TransportConfig;
pub use engine::{CloseHandle, SendOutcome, TransportEngine, TransportStats};
pub use error::TransportError;
pub use retransmit::{LostMessage, PendingSend, RetransmitQueue, TickOutcome};
#[cfg(feature = "udp")]
pub use udp::UdpDatagramSocket;

use std::net::SocketAddr;

/// An unreliable, unordered datagram channel.
///
/// The engine owns exactly one socket for its whole life. Implementations
/// only move bytes; they never interpret them.
pub trait DatagramSocket: Send + Sync + 'static {
    /// Sends one datagram to `dest`.
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<usize, TransportError>;

    /// Waits for the next datagram, writing it into `buf`.
    ///
    /// Returns the datagram length and its sender. Datagrams longer than
    /// `buf` are truncated.
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError>;

    /// Returns the address this socket is bound to.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}
