//! Wire envelopes for the JSON-RPC-flavored feed protocol.
//!
//! Every frame is a single JSON object carried in one WebSocket text
//! message. This module owns both directions: building outbound request
//! envelopes and decoding inbound text into a tagged [`InboundFrame`].
//!
//! # Protocol
//!
//! - Outbound request: `{"method": …, "jsonrpc": "2.0", "id": …, "params": …}`
//! - Inbound response: `{"jsonrpc": …, "id": …, "result": …}`
//! - Inbound push: a response whose `result` is `{"channel": …, "data": …}`
//!
//! Push shape wins over a bare `id` when both are present, so a push is
//! never misdelivered to a pending request. Anything that parses as JSON
//! but fits neither shape decodes to [`InboundFrame::Unroutable`]; text
//! that is not JSON at all is a decode error the caller logs and drops.

use crate::JSONRPC_VERSION;
use crate::error::protocol::ProtocolError;

use common::ErrorLocation;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named topic a caller can subscribe to.
///
/// Identity is `name` alone; `args` ride along on subscribe calls but do
/// not distinguish channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
        }
    }

    pub fn with_args(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args: Some(args),
        }
    }
}

/// Parameters for `private/subscribe` and `private/unsubscribe` calls.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionParams {
    pub channels: Vec<Channel>,
}

/// Outbound request envelope.
///
/// Field order matches the wire layout servers expect to see.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub method: String,
    pub jsonrpc: &'static str,
    pub id: u64,
    pub params: Value,
}

impl Request {
    pub fn new(method: impl Into<String>, id: u64, params: Value) -> Self {
        Self {
            method: method.into(),
            jsonrpc: JSONRPC_VERSION,
            id,
            params,
        }
    }
}

/// One decoded inbound frame, tagged by routing target.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Subscription push: `result` carried `{channel, data}`.
    Push { channel: String, data: Value },

    /// Reply to a pending request.
    Response { id: u64, result: Value },

    /// Parseable JSON that fits neither shape. Carries whatever envelope
    /// fields were present, for the log line.
    Unroutable {
        id: Option<u64>,
        method: Option<String>,
    },
}

/// Raw inbound envelope. All fields optional so classification, not
/// deserialization, decides what the frame is.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    method: Option<String>,
}

/// Shape probe for subscription pushes. Both fields must be present.
#[derive(Debug, Deserialize)]
struct PushResult {
    channel: String,
    data: Value,
}

/// Serialize an outbound request to its wire form.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_request(request: &Request) -> Result<String, ProtocolError> {
    serde_json::to_string(request).map_err(|e| ProtocolError::Encode {
        message: format!("Failed to encode request {}: {e}", request.id),
        location: ErrorLocation::caller(),
    })
}

/// Decode one inbound text frame into a tagged [`InboundFrame`].
///
/// # Arguments
///
/// * `text` - The payload of a WebSocket text message
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] if `text` is not a JSON object at
/// all. Structurally unexpected but parseable frames are not errors; they
/// decode to [`InboundFrame::Unroutable`].
pub fn decode_frame(text: &str) -> Result<InboundFrame, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)?;

    if let Some(result) = &envelope.result {
        if let Ok(push) = serde_json::from_value::<PushResult>(result.clone()) {
            return Ok(InboundFrame::Push {
                channel: push.channel,
                data: push.data,
            });
        }
    }

    match (envelope.id, envelope.result) {
        (Some(id), Some(result)) => Ok(InboundFrame::Response { id, result }),
        (id, _) => Ok(InboundFrame::Unroutable {
            id,
            method: envelope.method,
        }),
    }
}
