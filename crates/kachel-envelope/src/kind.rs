//! Inbound message kinds.
//!
//! Only replies are understood today. Anything else is logged and dropped by
//! the channel so that newer servers can add kinds without breaking clients.

/// Reply to a previously issued call.
pub const RESPONSE: &str = "response";
