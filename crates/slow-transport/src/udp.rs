//! UDP socket implementation using `tokio::net::UdpSocket`.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::{DatagramSocket, TransportError};

/// A [`DatagramSocket`] backed by a tokio UDP socket.
#[derive(Debug)]
pub struct UdpDatagramSocket {
    inner: UdpSocket,
}

impl UdpDatagramSocket {
    /// Binds a new socket to `addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS pick an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let inner = UdpSocket::bind(addr).await.map_err(TransportError::Bind)?;
        tracing::debug!(
            local = ?inner.local_addr().ok(),
            "UDP socket bound"
        );
        Ok(Self { inner })
    }

    /// Wraps an already configured tokio socket.
    pub fn from_tokio(inner: UdpSocket) -> Self {
        Self { inner }
    }
}

impl DatagramSocket for UdpDatagramSocket {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<usize, TransportError> {
        self.inner
            .send_to(buf, dest)
            .await
            .map_err(TransportError::Send)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        self.inner
            .recv_from(buf)
            .await
            .map_err(TransportError::Receive)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.inner.local_addr().map_err(TransportError::LocalAddr)
    }
}
