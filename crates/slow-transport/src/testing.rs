//! In-memory [`DatagramSocket`] for engine tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use slow_protocol::Message;
use tokio::sync::mpsc;

use crate::{DatagramSocket, TransportError};

/// The engine's side: records what is sent, yields what the peer injects.
pub(crate) struct MockSocket {
    local: SocketAddr,
    peer: SocketAddr,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

/// The test's side of a [`MockSocket`].
pub(crate) struct MockPeer {
    pub addr: SocketAddr,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl MockSocket {
    pub(crate) fn pair() -> (MockSocket, MockPeer) {
        let local: SocketAddr = ([127, 0, 0, 1], 40000).into();
        let peer: SocketAddr = ([127, 0, 0, 1], 7033).into();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = MockSocket {
            local,
            peer,
            sent: Arc::clone(&sent),
            inbound: tokio::sync::Mutex::new(rx),
        };
        let handle = MockPeer {
            addr: peer,
            sent,
            tx,
        };
        (socket, handle)
    }
}

impl MockPeer {
    /// Everything the engine transmitted so far, decoded, in order.
    pub(crate) fn sent(&self) -> Vec<Message> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|raw| Message::decode(raw).unwrap())
            .collect()
    }

    pub(crate) fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Queues a datagram for the engine's next receive.
    pub(crate) fn inject(&self, message: &Message) {
        self.inject_raw(message.encode().unwrap());
    }

    pub(crate) fn inject_raw(&self, raw: Vec<u8>) {
        self.tx.send(raw).unwrap();
    }
}

impl DatagramSocket for MockSocket {
    async fn send_to(&self, buf: &[u8], _dest: SocketAddr) -> Result<usize, TransportError> {
        self.sent.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(datagram) => {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok((n, self.peer))
            }
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.local)
    }
}
