//! Reconnecting request/response RPC for the kachel heating controller.
//!
//! The dashboard talks to the controller over one WebSocket. This crate
//! turns that connection into ordered-looking calls: issue a command, await
//! its return value, and let the channel worry about reconnecting.
//!
//! # Crate Structure
//!
//! - [`transport`] — Duplex message connections (WebSocket, in-memory)
//! - [`envelope`] — Call/response envelopes and their JSON codec
//! - [`channel`] — Sequence correlation, pending-table compaction and the
//!   reconnect state machine
//!
//! ```no_run
//! # async fn demo() -> kachel::channel::Result<()> {
//! let channel = kachel::channel::connect("ws://controller.local/ws");
//! channel.connected().await?;
//! let state = channel.call("get", vec![], Default::default()).await?;
//! println!("{state}");
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use kachel_transport::*;
}

/// Re-export envelope types.
pub mod envelope {
    pub use kachel_envelope::*;
}

/// Re-export channel types.
pub mod channel {
    pub use kachel_channel::*;
}
