//! Reconnecting, sequence-correlated request/response channel.
//!
//! This is the layer the dashboard talks to. Issue a call, await its return
//! value; the channel numbers calls, matches replies by sequence number, and
//! keeps reconnecting for as long as a handle is alive.
//!
//! Calls that are in flight when the connection drops are not retried. By
//! default they are abandoned: they never resolve with a value, and fail
//! with [`ChannelError::Abandoned`] once the next connection replaces their
//! table. [`DisconnectPolicy::Reject`] fails them immediately instead.

pub mod channel;
pub mod config;
pub mod connector;
pub mod correlator;
pub mod error;
pub mod lifecycle;

pub use channel::{Channel, ConnectEvents, PendingCall, TableStats};
pub use config::{ChannelConfig, DisconnectPolicy, DEFAULT_COMMAND_BUFFER, DEFAULT_RECONNECT_DELAY};
pub use connector::{connect, connect_with_config};
pub use correlator::Correlator;
pub use error::{ChannelError, CorrelationError, Result};
pub use lifecycle::{LinkState, Status};
