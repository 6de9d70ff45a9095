use std::time::Duration;

/// Errors surfaced to callers of the channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A call was issued while no connection was open.
    #[error("channel is not connected")]
    NotConnected,

    /// The connection dropped while the call was outstanding.
    #[error("connection lost while call was pending (generation {generation})")]
    ConnectionLost { generation: u64 },

    /// The call's connection generation was replaced before a reply arrived.
    #[error("call abandoned with connection generation {generation}")]
    Abandoned { generation: u64 },

    /// The channel has shut down.
    #[error("channel shut down")]
    Shutdown,

    /// The call could not be encoded.
    #[error("envelope error: {0}")]
    Envelope(#[from] kachel_envelope::EnvelopeError),

    /// No reply arrived within the caller's deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

/// A response that does not match an outstanding call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    /// The sequence number lies outside the table.
    #[error("sequence {sequence} out of range (table length {len})")]
    OutOfRange { sequence: u64, len: u64 },

    /// The slot exists but its reply was already delivered.
    #[error("sequence {0} already resolved")]
    AlreadyResolved(u64),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
