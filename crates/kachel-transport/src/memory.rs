//! In-process connections.
//!
//! A [`MemoryConnector`] hands the server end of every successful attempt to
//! its [`MemoryAcceptor`]. Both ends are [`MemoryConnection`]s, so a test can
//! play the remote side with the same API the client uses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, MessageConnection};

#[derive(Debug)]
enum Wire {
    Text(String),
    Fault(String),
}

/// Create a connector and the acceptor that receives its connections.
pub fn memory_connector() -> (MemoryConnector, MemoryAcceptor) {
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let refusing = Arc::new(AtomicBool::new(false));
    (
        MemoryConnector {
            incoming: incoming_tx,
            refusing: Arc::clone(&refusing),
        },
        MemoryAcceptor {
            incoming: incoming_rx,
            refusing,
        },
    )
}

/// Client side of an in-memory transport.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    incoming: mpsc::UnboundedSender<MemoryConnection>,
    refusing: Arc<AtomicBool>,
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, address: &str) -> Result<MemoryConnection> {
        if self.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::Refused(address.to_string()));
        }
        let (client, server) = MemoryConnection::pair(address);
        self.incoming
            .send(server)
            .map_err(|_| TransportError::Refused(address.to_string()))?;
        debug!(address, "memory connection established");
        Ok(client)
    }
}

/// Server side of an in-memory transport.
#[derive(Debug)]
pub struct MemoryAcceptor {
    incoming: mpsc::UnboundedReceiver<MemoryConnection>,
    refusing: Arc<AtomicBool>,
}

impl MemoryAcceptor {
    /// Wait for the next connection attempt that was let through.
    ///
    /// Returns `None` once every connector has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryConnection> {
        self.incoming.recv().await
    }

    /// Make subsequent connect attempts fail with [`TransportError::Refused`].
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

/// One end of an in-memory duplex connection.
#[derive(Debug)]
pub struct MemoryConnection {
    address: String,
    tx: Option<mpsc::UnboundedSender<Wire>>,
    rx: mpsc::UnboundedReceiver<Wire>,
}

impl MemoryConnection {
    /// Create two connected ends.
    pub fn pair(address: &str) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Self {
                address: address.to_string(),
                tx: Some(b_tx),
                rx: a_rx,
            },
            Self {
                address: address.to_string(),
                tx: Some(a_tx),
                rx: b_rx,
            },
        )
    }

    /// Address the connection was opened against.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Deliver a transport error to the other end's next `recv`.
    pub fn inject_fault(&self, reason: &str) -> Result<()> {
        self.push(Wire::Fault(reason.to_string()))
    }

    /// Whether this end has been closed locally.
    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    fn push(&self, wire: Wire) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(wire).map_err(|_| TransportError::Closed)
    }
}

impl MessageConnection for MemoryConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        self.push(Wire::Text(text))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        match self.rx.recv().await? {
            Wire::Text(text) => Some(Ok(text)),
            Wire::Fault(reason) => Some(Err(TransportError::Io(std::io::Error::other(reason)))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_delivers_in_both_directions() {
        let (mut a, mut b) = MemoryConnection::pair("mem://x");
        a.send("ping".to_string()).await.unwrap();
        b.send("pong".to_string()).await.unwrap();

        assert_eq!(b.recv().await.unwrap().unwrap(), "ping");
        assert_eq!(a.recv().await.unwrap().unwrap(), "pong");
        assert_eq!(a.address(), "mem://x");
    }

    #[tokio::test]
    async fn close_ends_remote_stream() {
        let (mut a, mut b) = MemoryConnection::pair("mem://x");
        a.close().await.unwrap();

        assert!(a.is_closed());
        assert!(b.recv().await.is_none());
        assert!(matches!(
            a.send("late".to_string()).await,
            Err(TransportError::Closed)
        ));
        // closing twice is fine
        a.close().await.unwrap();
    }

    #[tokio::test]
    async fn fault_surfaces_as_error() {
        let (mut a, b) = MemoryConnection::pair("mem://x");
        b.inject_fault("reset by peer").unwrap();

        let err = a.recv().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("reset by peer"));
    }

    #[tokio::test]
    async fn connector_hands_server_end_to_acceptor() {
        let (connector, mut acceptor) = memory_connector();
        let mut client = connector.connect("mem://controller").await.unwrap();
        let mut server = acceptor.accept().await.unwrap();

        assert_eq!(server.address(), "mem://controller");
        client.send("hello".to_string()).await.unwrap();
        assert_eq!(server.recv().await.unwrap().unwrap(), "hello");
    }

    #[tokio::test]
    async fn refusing_acceptor_rejects_attempts() {
        let (connector, acceptor) = memory_connector();
        acceptor.set_refusing(true);
        assert!(matches!(
            connector.connect("mem://a").await,
            Err(TransportError::Refused(_))
        ));

        acceptor.set_refusing(false);
        assert!(connector.connect("mem://a").await.is_ok());

        drop(acceptor);
        assert!(matches!(
            connector.connect("mem://a").await,
            Err(TransportError::Refused(_))
        ));
    }
}
