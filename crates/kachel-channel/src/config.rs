use std::time::Duration;

use kachel_envelope::EnvelopeConfig;

/// Delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Default capacity of the handle-to-driver request queue.
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

/// What happens to outstanding calls when the connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectPolicy {
    /// Leave them unresolved. Their table is discarded at the next successful
    /// connect, at which point they fail with `ChannelError::Abandoned`.
    #[default]
    Abandon,
    /// Fail them with `ChannelError::ConnectionLost` as soon as the
    /// connection closes.
    Reject,
}

/// Configuration for a [`Channel`](crate::Channel).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Fixed delay before reconnecting. Default: 1000 ms.
    pub reconnect_delay: Duration,
    /// Handling of calls in flight at disconnect. Default: abandon.
    pub disconnect_policy: DisconnectPolicy,
    /// Request queue capacity between handles and the driver. Default: 64.
    pub command_buffer: usize,
    /// Inbound envelope limits.
    pub envelope: EnvelopeConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            disconnect_policy: DisconnectPolicy::default(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
            envelope: EnvelopeConfig::default(),
        }
    }
}
