use kachel_transport::WebSocketConnector;

use crate::channel::Channel;
use crate::config::ChannelConfig;

/// Open a WebSocket channel to `address` (e.g. `ws://controller.local/ws`).
///
/// Returns immediately; the first connection attempt runs in the background.
/// Use [`Channel::connected`] or [`Channel::connect_events`] to learn when
/// calls can be issued.
pub fn connect(address: impl Into<String>) -> Channel {
    connect_with_config(address, ChannelConfig::default())
}

/// Open a WebSocket channel with explicit configuration.
pub fn connect_with_config(address: impl Into<String>, config: ChannelConfig) -> Channel {
    Channel::spawn(WebSocketConnector::new(), address, config)
}
