use serde_json::json;

use crate::JSONRPC_VERSION;
use crate::error::protocol::ProtocolError;
use crate::protocol::{Channel, InboundFrame, Request, SubscriptionParams, decode_frame, encode_request};

// ============================================================================
// OUTBOUND ENCODING
// ============================================================================

/// **VALUE**: Pins the exact wire layout of an outbound request.
///
/// **WHY THIS MATTERS**: The server parses requests positionally tolerant but
/// other consumers of the feed log raw frames; a silent field reordering or
/// rename would only surface in production captures.
///
/// **BUG THIS CATCHES**: Reordering the `Request` struct fields or renaming
/// one of them changes the serialized frame.
#[test]
fn given_request_when_encoded_then_matches_wire_layout() {
    let request = Request::new("public/get_time", 42, json!({}));

    let encoded = encode_request(&request).unwrap();

    assert_eq!(
        encoded,
        r#"{"method":"public/get_time","jsonrpc":"2.0","id":42,"params":{}}"#
    );
}

#[test]
fn given_request_when_encoded_then_carries_jsonrpc_version() {
    let request = Request::new("private/subscribe", 1, json!({"channels": []}));

    let encoded = encode_request(&request).unwrap();
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

    assert_eq!(value["jsonrpc"], JSONRPC_VERSION);
    assert_eq!(value["method"], "private/subscribe");
    assert_eq!(value["id"], 1);
}

/// **VALUE**: Verifies channels without arguments stay minimal on the wire.
///
/// **WHY THIS MATTERS**: Some feed servers reject `"args": null` as a malformed
/// channel descriptor, so absence must be encoded as omission.
///
/// **BUG THIS CATCHES**: Dropping the skip attribute on `Channel::args`
/// reintroduces the null field.
#[test]
fn given_channel_without_args_when_serialized_then_args_omitted() {
    let channel = Channel::new("ticker.BTC");

    let encoded = serde_json::to_string(&channel).unwrap();

    assert_eq!(encoded, r#"{"name":"ticker.BTC"}"#);
}

#[test]
fn given_channel_with_args_when_serialized_then_args_included() {
    let channel = Channel::with_args("trades", json!({"depth": 10}));

    let encoded = serde_json::to_string(&channel).unwrap();

    assert_eq!(encoded, r#"{"name":"trades","args":{"depth":10}}"#);
}

#[test]
fn given_subscription_params_when_serialized_then_channels_nested() {
    let params = SubscriptionParams {
        channels: vec![Channel::new("ticker.BTC"), Channel::new("trades")],
    };

    let encoded = serde_json::to_string(&params).unwrap();

    assert_eq!(
        encoded,
        r#"{"channels":[{"name":"ticker.BTC"},{"name":"trades"}]}"#
    );
}

// ============================================================================
// INBOUND DECODING
// ============================================================================

#[test]
fn given_push_frame_when_decoded_then_channel_and_data_extracted() {
    let frame = r#"{"jsonrpc":"2.0","method":"subscription","result":{"channel":"ticker.BTC","data":{"price":97000}}}"#;

    let decoded = decode_frame(frame).unwrap();

    assert_eq!(
        decoded,
        InboundFrame::Push {
            channel: "ticker.BTC".to_string(),
            data: json!({"price": 97000}),
        }
    );
}

#[test]
fn given_response_frame_when_decoded_then_id_and_result_extracted() {
    let frame = r#"{"jsonrpc":"2.0","id":7,"result":"pong"}"#;

    let decoded = decode_frame(frame).unwrap();

    assert_eq!(
        decoded,
        InboundFrame::Response {
            id: 7,
            result: json!("pong"),
        }
    );
}

/// **VALUE**: Locks in the routing priority when a frame is ambiguous.
///
/// **WHY THIS MATTERS**: Some servers echo a request id on subscription
/// notifications. Treating such a frame as a response would consume a pending
/// callback that belongs to a different request and starve the channel
/// subscribers of their update.
///
/// **BUG THIS CATCHES**: Checking `id` before probing the push shape flips the
/// classification.
#[test]
fn given_frame_with_push_result_and_id_when_decoded_then_push_wins() {
    let frame = r#"{"jsonrpc":"2.0","id":9,"result":{"channel":"trades","data":[1,2,3]}}"#;

    let decoded = decode_frame(frame).unwrap();

    assert_eq!(
        decoded,
        InboundFrame::Push {
            channel: "trades".to_string(),
            data: json!([1, 2, 3]),
        }
    );
}

#[test]
fn given_result_object_not_push_shaped_when_decoded_then_response() {
    // GIVEN: a result carrying a "channel" key of the wrong type
    let frame = r#"{"jsonrpc":"2.0","id":3,"result":{"channel":5,"data":"x"}}"#;

    // WHEN: the frame is decoded
    let decoded = decode_frame(frame).unwrap();

    // THEN: the push probe fails and the id routes it as a response
    assert_eq!(
        decoded,
        InboundFrame::Response {
            id: 3,
            result: json!({"channel": 5, "data": "x"}),
        }
    );
}

#[test]
fn given_result_missing_data_key_when_decoded_then_response() {
    let frame = r#"{"jsonrpc":"2.0","id":4,"result":{"channel":"ticker.BTC"}}"#;

    let decoded = decode_frame(frame).unwrap();

    assert_eq!(
        decoded,
        InboundFrame::Response {
            id: 4,
            result: json!({"channel": "ticker.BTC"}),
        }
    );
}

#[test]
fn given_frame_without_id_or_push_when_decoded_then_unroutable() {
    let frame = r#"{"jsonrpc":"2.0","method":"heartbeat"}"#;

    let decoded = decode_frame(frame).unwrap();

    assert_eq!(
        decoded,
        InboundFrame::Unroutable {
            id: None,
            method: Some("heartbeat".to_string()),
        }
    );
}

#[test]
fn given_frame_with_id_but_no_result_when_decoded_then_unroutable() {
    let frame = r#"{"jsonrpc":"2.0","id":12}"#;

    let decoded = decode_frame(frame).unwrap();

    assert_eq!(
        decoded,
        InboundFrame::Unroutable {
            id: Some(12),
            method: None,
        }
    );
}

#[test]
fn given_invalid_json_when_decoded_then_decode_error() {
    let result = decode_frame("not json at all {{");

    assert!(matches!(result, Err(ProtocolError::Decode { .. })));
}

#[test]
fn given_json_array_when_decoded_then_decode_error() {
    // Batch frames are not part of the protocol; they must be rejected, not
    // silently classified as unroutable.
    let result = decode_frame(r#"[{"id":1,"result":"pong"}]"#);

    assert!(matches!(result, Err(ProtocolError::Decode { .. })));
}
