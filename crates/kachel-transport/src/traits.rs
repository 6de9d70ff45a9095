use std::future::Future;

use crate::error::Result;

/// One generation of a duplex, message-oriented connection.
///
/// Messages are whole text units: a single `send` is delivered as a single
/// message, never split or merged.
pub trait MessageConnection: Send + 'static {
    /// Transmit one message.
    fn send(&mut self, text: String) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next inbound message.
    ///
    /// Returns `None` once the remote side has closed the connection.
    /// Must be cancel-safe: dropping the future before it completes loses
    /// no message.
    fn recv(&mut self) -> impl Future<Output = Option<Result<String>>> + Send;

    /// Close the connection. Closing an already closed connection is not an error.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens a fresh [`MessageConnection`] for every connection attempt.
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced by this connector.
    type Connection: MessageConnection;

    /// Attempt one connection to `address`.
    fn connect(&self, address: &str) -> impl Future<Output = Result<Self::Connection>> + Send;
}
