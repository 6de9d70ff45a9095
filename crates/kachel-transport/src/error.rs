use tokio_tungstenite::tungstenite;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a connection to the specified address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: Box<tungstenite::Error>,
    },

    /// Nobody is accepting connections at the specified address.
    #[error("connection to {0} refused")]
    Refused(String),

    /// A WebSocket protocol or I/O error on an open connection.
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// A binary message did not carry UTF-8 text.
    #[error("received non-UTF-8 binary message: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// An I/O error occurred on the connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection has already been closed.
    #[error("connection closed")]
    Closed,
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
