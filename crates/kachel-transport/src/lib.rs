//! Duplex message-connection abstraction.
//!
//! Provides a unified interface over message-oriented connections:
//! - WebSocket (text frames, via tokio-tungstenite)
//! - In-memory pairs (tests and demos)
//!
//! This is the lowest layer of kachel. A [`Connector`] produces one
//! [`MessageConnection`] per connection attempt; nothing above this layer
//! holds a connection longer than that.

pub mod error;
pub mod memory;
pub mod traits;
pub mod websocket;

pub use error::{Result, TransportError};
pub use memory::{memory_connector, MemoryAcceptor, MemoryConnection, MemoryConnector};
pub use traits::{Connector, MessageConnection};
pub use websocket::{WebSocketConnection, WebSocketConnector};
