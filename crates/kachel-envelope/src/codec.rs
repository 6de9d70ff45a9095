use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EnvelopeError, Result};
use crate::kind::RESPONSE;

/// Default maximum inbound message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// An outbound remote call.
///
/// Wire format:
/// ```text
/// {"command": "click", "args": ["relay_fan"], "kwargs": {}, "sequence": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Name of the remote command.
    pub command: String,
    /// Positional arguments, in order.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    /// Sequence number the response must echo.
    pub sequence: u64,
}

impl CallEnvelope {
    /// Create a call with no arguments.
    pub fn new(command: impl Into<String>, sequence: u64) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            sequence,
        }
    }

    /// Replace the positional arguments.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Replace the keyword arguments.
    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }
}

/// An inbound reply to a call.
///
/// Wire format:
/// ```text
/// {"type": "response", "command": "click", "sequence": 1, "return": {"ok": true}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Command name echoed from the call.
    pub command: String,
    /// Sequence number of the call being answered.
    pub sequence: u64,
    /// Return value; `null` when the field is absent.
    #[serde(rename = "return", default)]
    pub value: Value,
}

impl ResponseEnvelope {
    pub fn new(command: impl Into<String>, sequence: u64, value: Value) -> Self {
        Self {
            command: command.into(),
            sequence,
            value,
        }
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A reply to a call.
    Response(ResponseEnvelope),
    /// Any other message kind; `None` when the message has no string `type`.
    Unknown { kind: Option<String> },
}

/// Configuration for envelope decoding.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Maximum inbound message size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
        }
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    body: &'a T,
}

/// Encode a call into its wire text.
pub fn encode_call(call: &CallEnvelope) -> Result<String> {
    serde_json::to_string(call).map_err(Into::into)
}

/// Encode a response into its wire text, tagged with `"type": "response"`.
pub fn encode_response(response: &ResponseEnvelope) -> Result<String> {
    let tagged = Tagged {
        kind: RESPONSE,
        body: response,
    };
    serde_json::to_string(&tagged).map_err(Into::into)
}

/// Decode a call from its wire text.
pub fn decode_call(text: &str) -> Result<CallEnvelope> {
    serde_json::from_str(text).map_err(Into::into)
}

/// Decode an inbound message with the default configuration.
pub fn decode_inbound(text: &str) -> Result<Inbound> {
    decode_inbound_with_config(text, &EnvelopeConfig::default())
}

/// Decode an inbound message.
///
/// Messages whose `type` is not `"response"` are not an error; they decode
/// to [`Inbound::Unknown`] so the caller can log and drop them.
pub fn decode_inbound_with_config(text: &str, config: &EnvelopeConfig) -> Result<Inbound> {
    if text.len() > config.max_message_size {
        return Err(EnvelopeError::MessageTooLarge {
            size: text.len(),
            max: config.max_message_size,
        });
    }

    let value: Value = serde_json::from_str(text)?;
    let Value::Object(object) = value else {
        return Err(EnvelopeError::NotAnObject);
    };

    match object.get("type").and_then(Value::as_str) {
        Some(RESPONSE) => {
            let response = serde_json::from_value(Value::Object(object))?;
            Ok(Inbound::Response(response))
        }
        kind => Ok(Inbound::Unknown {
            kind: kind.map(str::to_owned),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn call_wire_shape() {
        let call = CallEnvelope::new("click", 1).with_args(vec![json!("relay_fan")]);
        let text = encode_call(&call).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(
            value,
            json!({"command": "click", "args": ["relay_fan"], "kwargs": {}, "sequence": 1})
        );
        assert_eq!(decode_call(&text).unwrap(), call);
    }

    #[test]
    fn call_carries_keyword_arguments() {
        let mut kwargs = Map::new();
        kwargs.insert("hold".to_string(), json!(true));
        let call = CallEnvelope::new("set_target", 4)
            .with_args(vec![json!("living_room"), json!(21.5)])
            .with_kwargs(kwargs);
        let value: Value = serde_json::from_str(&encode_call(&call).unwrap()).unwrap();

        assert_eq!(value["args"], json!(["living_room", 21.5]));
        assert_eq!(value["kwargs"], json!({"hold": true}));
        assert_eq!(value["sequence"], 4);
    }

    #[test]
    fn call_defaults_missing_arguments() {
        let call = decode_call(r#"{"command":"get","sequence":0}"#).unwrap();
        assert!(call.args.is_empty());
        assert!(call.kwargs.is_empty());
    }

    #[test]
    fn decodes_response() {
        let inbound = decode_inbound(
            r#"{"type":"response","command":"click","sequence":1,"return":{"ok":true}}"#,
        )
        .unwrap();

        assert_eq!(
            inbound,
            Inbound::Response(ResponseEnvelope::new("click", 1, json!({"ok": true})))
        );
    }

    #[test]
    fn missing_return_is_null() {
        let inbound = decode_inbound(r#"{"type":"response","command":"get","sequence":3}"#).unwrap();
        let Inbound::Response(response) = inbound else {
            panic!("expected response");
        };
        assert_eq!(response.value, Value::Null);
    }

    #[test]
    fn encoded_response_is_tagged() {
        let text = encode_response(&ResponseEnvelope::new("get", 0, json!({"sensors": {}}))).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "response");
        assert_eq!(value["return"], json!({"sensors": {}}));
        assert!(matches!(decode_inbound(&text).unwrap(), Inbound::Response(_)));
    }

    #[test]
    fn other_kinds_are_unknown() {
        assert_eq!(
            decode_inbound(r#"{"type":"event","sequence":0}"#).unwrap(),
            Inbound::Unknown {
                kind: Some("event".to_string())
            }
        );
        assert_eq!(
            decode_inbound(r#"{"sensors":{}}"#).unwrap(),
            Inbound::Unknown { kind: None }
        );
    }

    #[test]
    fn rejects_non_objects_and_bad_json() {
        assert!(matches!(
            decode_inbound("[1,2,3]"),
            Err(EnvelopeError::NotAnObject)
        ));
        assert!(matches!(decode_inbound("{nope"), Err(EnvelopeError::Json(_))));
    }

    #[test]
    fn rejects_negative_sequence() {
        let result = decode_inbound(r#"{"type":"response","command":"get","sequence":-1}"#);
        assert!(matches!(result, Err(EnvelopeError::Json(_))));
    }

    #[test]
    fn enforces_max_message_size() {
        let config = EnvelopeConfig {
            max_message_size: 8,
        };
        let result = decode_inbound_with_config(r#"{"type":"response"}"#, &config);
        assert!(matches!(
            result,
            Err(EnvelopeError::MessageTooLarge { max: 8, .. })
        ));
    }
}
