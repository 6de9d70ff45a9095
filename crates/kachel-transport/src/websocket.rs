use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, MessageConnection};

/// Opens `ws://` connections with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    type Connection = WebSocketConnection<MaybeTlsStream<TcpStream>>;

    async fn connect(&self, address: &str) -> Result<Self::Connection> {
        let (stream, response) =
            connect_async(address)
                .await
                .map_err(|source| TransportError::Connect {
                    address: address.to_string(),
                    source: Box::new(source),
                })?;
        debug!(address, status = %response.status(), "websocket handshake complete");
        Ok(WebSocketConnection::new(stream))
    }
}

/// A WebSocket carrying one message per text frame.
///
/// Binary frames are accepted when they hold valid UTF-8. Pings are answered
/// by tungstenite itself on the next read or write, so `recv` never awaits
/// anything but the next frame and stays cancel-safe.
pub struct WebSocketConnection<S> {
    stream: WebSocketStream<S>,
}

impl<S> WebSocketConnection<S> {
    /// Wrap an already-handshaken WebSocket stream.
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }

    /// Consume the connection and return the underlying stream.
    pub fn into_inner(self) -> WebSocketStream<S> {
        self.stream
    }
}

impl<S> MessageConnection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => {
                    return Some(String::from_utf8(data.to_vec()).map_err(Into::into));
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "websocket closed by remote");
                    return None;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        // After a remote Close frame tungstenite has already queued the reply
        // and refuses to send another one.
        match self.stream.close(None).await {
            Ok(())
            | Err(
                WsError::ConnectionClosed
                | WsError::AlreadyClosed
                | WsError::Protocol(ProtocolError::SendAfterClosing),
            ) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl<S> std::fmt::Debug for WebSocketConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection").finish_non_exhaustive()
    }
}
