use crate::client::correlator::RequestCorrelator;
use crate::client::dispatcher::dispatch;
use crate::client::registry::SubscriptionRegistry;
use crate::protocol::{Channel, InboundFrame, decode_frame};

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

type Recorded = Arc<Mutex<Vec<Value>>>;

fn recorder() -> (Recorded, Box<dyn FnMut(Value) + Send>) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    (recorded, Box::new(move |data| sink.lock().unwrap().push(data)))
}

#[test]
fn given_push_frame_when_dispatched_then_channel_callbacks_receive_data() {
    let mut registry = SubscriptionRegistry::new();
    let mut correlator = RequestCorrelator::new();
    let (first, first_callback) = recorder();
    let (second, second_callback) = recorder();
    registry.add(&Channel::new("ticker.BTC"), 1, first_callback);
    registry.add(&Channel::new("ticker.BTC"), 2, second_callback);

    dispatch(
        InboundFrame::Push {
            channel: "ticker.BTC".to_string(),
            data: json!({"price": 97000}),
        },
        &mut registry,
        &mut correlator,
    );

    assert_eq!(*first.lock().unwrap(), vec![json!({"price": 97000})]);
    assert_eq!(*second.lock().unwrap(), vec![json!({"price": 97000})]);
}

/// **VALUE**: Verifies response delivery is at-most-once per request id.
///
/// **WHY THIS MATTERS**: Servers under reconnect churn occasionally replay a
/// response frame. A callback that fires twice double-applies whatever state
/// change it guards.
///
/// **BUG THIS CATCHES**: Looking the pending entry up without consuming it.
#[test]
fn given_duplicate_response_when_dispatched_then_callback_fires_once() {
    let mut registry = SubscriptionRegistry::new();
    let mut correlator = RequestCorrelator::new();
    let (recorded, callback) = recorder();
    let id = correlator.fresh_id();
    correlator.register(id, callback);
    let frame = InboundFrame::Response {
        id,
        result: json!("pong"),
    };

    dispatch(frame.clone(), &mut registry, &mut correlator);
    dispatch(frame, &mut registry, &mut correlator);

    assert_eq!(*recorded.lock().unwrap(), vec![json!("pong")]);
    assert!(!correlator.is_pending(id));
}

#[test]
fn given_push_for_unknown_channel_when_dispatched_then_dropped() {
    let mut registry = SubscriptionRegistry::new();
    let mut correlator = RequestCorrelator::new();
    let (recorded, callback) = recorder();
    let id = correlator.fresh_id();
    correlator.register(id, callback);

    dispatch(
        InboundFrame::Push {
            channel: "ticker.BTC".to_string(),
            data: json!(1),
        },
        &mut registry,
        &mut correlator,
    );

    // The pending table is untouched; a stray push must not consume it.
    assert!(correlator.is_pending(id));
    assert!(recorded.lock().unwrap().is_empty());
}

#[test]
fn given_response_with_unknown_id_when_dispatched_then_dropped() {
    let mut registry = SubscriptionRegistry::new();
    let mut correlator = RequestCorrelator::new();
    let (recorded, callback) = recorder();
    registry.add(&Channel::new("ticker.BTC"), 1, callback);

    dispatch(
        InboundFrame::Response {
            id: 999,
            result: json!("pong"),
        },
        &mut registry,
        &mut correlator,
    );

    assert!(recorded.lock().unwrap().is_empty());
}

#[test]
fn given_unroutable_frame_when_dispatched_then_noop() {
    let mut registry = SubscriptionRegistry::new();
    let mut correlator = RequestCorrelator::new();
    let (recorded, callback) = recorder();
    registry.add(&Channel::new("ticker.BTC"), 1, callback);

    dispatch(
        InboundFrame::Unroutable {
            id: Some(12),
            method: Some("heartbeat".to_string()),
        },
        &mut registry,
        &mut correlator,
    );

    assert!(recorded.lock().unwrap().is_empty());
    assert_eq!(correlator.pending_count(), 0);
}

/// **VALUE**: Verifies end-to-end that an ambiguous frame reaches channel
/// subscribers and leaves the pending table alone.
///
/// **WHY THIS MATTERS**: This is the full decode-then-dispatch path for the
/// trickiest frame the server emits. Classification and routing have to agree
/// on who owns it.
///
/// **BUG THIS CATCHES**: A decoder that classifies by id first hands the frame
/// to the correlator, which consumes the pending entry and drops the update.
#[test]
fn given_push_shaped_frame_with_id_when_dispatched_then_pending_entry_survives() {
    let mut registry = SubscriptionRegistry::new();
    let mut correlator = RequestCorrelator::new();
    let (pushed, push_callback) = recorder();
    let (responded, response_callback) = recorder();
    registry.add(&Channel::new("trades"), 1, push_callback);
    let id = correlator.fresh_id();
    correlator.register(id, response_callback);

    let frame = decode_frame(&format!(
        r#"{{"jsonrpc":"2.0","id":{id},"result":{{"channel":"trades","data":[1,2]}}}}"#
    ))
    .unwrap();
    dispatch(frame, &mut registry, &mut correlator);

    assert_eq!(*pushed.lock().unwrap(), vec![json!([1, 2])]);
    assert!(responded.lock().unwrap().is_empty());
    assert!(correlator.is_pending(id));
}
