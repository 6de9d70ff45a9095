//! Call and response envelopes for the kachel RPC channel.
//!
//! Every message on the wire is one JSON object:
//! - outbound calls carry `command`, `args`, `kwargs` and a `sequence` number
//! - inbound messages carry a `type`; only `"response"` is understood, and
//!   echoes the `command` and `sequence` of the call it answers together
//!   with its `return` value

pub mod codec;
pub mod error;
pub mod kind;

pub use codec::{
    decode_call, decode_inbound, decode_inbound_with_config, encode_call, encode_response,
    CallEnvelope, EnvelopeConfig, Inbound, ResponseEnvelope, DEFAULT_MAX_MESSAGE,
};
pub use error::{EnvelopeError, Result};
pub use kind::RESPONSE;
