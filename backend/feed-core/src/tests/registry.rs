use crate::client::ChanCallback;
use crate::client::registry::SubscriptionRegistry;
use crate::protocol::Channel;

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

fn noop() -> ChanCallback {
    Box::new(|_| {})
}

fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> ChanCallback {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    Box::new(move |data: Value| {
        log.lock().unwrap().push(format!("{tag}:{data}"));
    })
}

// ============================================================================
// REFCOUNT TRANSITIONS
// ============================================================================

/// **VALUE**: Verifies the 0→1 transition is the only one that requests a
/// subscribe call.
///
/// **WHY THIS MATTERS**: Every `true` from `add` turns into a
/// `private/subscribe` frame on the wire. A second frame for an already
/// subscribed channel is at best redundant traffic and at worst a server-side
/// double subscription.
///
/// **BUG THIS CATCHES**: Returning `true` unconditionally, or keying the
/// transition on anything other than the callback count.
#[test]
fn given_empty_channel_when_first_callback_added_then_subscribe_due() {
    let mut registry = SubscriptionRegistry::new();
    let channel = Channel::new("ticker.BTC");

    let first = registry.add(&channel, 1, noop());
    let second = registry.add(&channel, 2, noop());

    assert!(first);
    assert!(!second);
    assert_eq!(registry.subscriber_count("ticker.BTC"), 2);
}

#[test]
fn given_two_callbacks_when_one_removed_then_no_unsubscribe_due() {
    let mut registry = SubscriptionRegistry::new();
    let channel = Channel::new("ticker.BTC");
    registry.add(&channel, 1, noop());
    registry.add(&channel, 2, noop());

    let emptied = registry.remove("ticker.BTC", 1);

    assert!(!emptied);
    assert_eq!(registry.subscriber_count("ticker.BTC"), 1);
}

#[test]
fn given_last_callback_removed_then_unsubscribe_due() {
    let mut registry = SubscriptionRegistry::new();
    let channel = Channel::new("ticker.BTC");
    registry.add(&channel, 1, noop());

    let emptied = registry.remove("ticker.BTC", 1);

    assert!(emptied);
    assert_eq!(registry.subscriber_count("ticker.BTC"), 0);
    assert!(registry.active_channels().is_empty());
}

/// **VALUE**: Verifies the refcount cycle restarts cleanly.
///
/// **WHY THIS MATTERS**: Subscribe, unsubscribe, subscribe again is a normal
/// pattern for short-lived consumers. The second subscribe must be announced
/// to the server just like the first.
///
/// **BUG THIS CATCHES**: Leaving an empty entry behind on 1→0 so the next
/// `add` sees a non-empty map and stays silent.
#[test]
fn given_channel_readded_after_emptying_then_subscribe_due_again() {
    let mut registry = SubscriptionRegistry::new();
    let channel = Channel::new("trades");
    registry.add(&channel, 1, noop());
    registry.remove("trades", 1);

    let readded = registry.add(&channel, 2, noop());

    assert!(readded);
}

#[test]
fn given_unknown_channel_or_id_when_removed_then_noop() {
    let mut registry = SubscriptionRegistry::new();
    registry.add(&Channel::new("trades"), 1, noop());

    assert!(!registry.remove("ticker.BTC", 1));
    assert!(!registry.remove("trades", 99));
    assert_eq!(registry.subscriber_count("trades"), 1);
}

// ============================================================================
// DELIVERY
// ============================================================================

#[test]
fn given_push_delivered_then_callbacks_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = SubscriptionRegistry::new();
    let channel = Channel::new("ticker.BTC");
    registry.add(&channel, 1, recording(&log, "a"));
    registry.add(&channel, 2, recording(&log, "b"));

    let delivered = registry.deliver("ticker.BTC", &json!(42));

    assert_eq!(delivered, 2);
    assert_eq!(*log.lock().unwrap(), vec!["a:42", "b:42"]);
}

#[test]
fn given_removed_callback_when_push_delivered_then_not_invoked() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = SubscriptionRegistry::new();
    let channel = Channel::new("ticker.BTC");
    registry.add(&channel, 1, recording(&log, "a"));
    registry.add(&channel, 2, recording(&log, "b"));
    registry.remove("ticker.BTC", 1);

    let delivered = registry.deliver("ticker.BTC", &json!(1));

    assert_eq!(delivered, 1);
    assert_eq!(*log.lock().unwrap(), vec!["b:1"]);
}

#[test]
fn given_no_subscribers_when_push_delivered_then_zero() {
    let mut registry = SubscriptionRegistry::new();

    assert_eq!(registry.deliver("ticker.BTC", &json!(1)), 0);
}

// ============================================================================
// RECONNECT REPLAY
// ============================================================================

/// **VALUE**: Verifies the first subscriber's channel arguments survive for
/// replay after a reconnect.
///
/// **WHY THIS MATTERS**: Re-subscribing with `{"name": "trades"}` when the
/// original subscription carried `{"name": "trades", "args": {...}}` silently
/// changes what the server streams back.
///
/// **BUG THIS CATCHES**: Storing only the channel name and reconstructing a
/// bare `Channel` at replay time.
#[test]
fn given_channel_with_args_when_replayed_then_args_preserved() {
    let mut registry = SubscriptionRegistry::new();
    let channel = Channel::with_args("trades", json!({"depth": 10}));
    registry.add(&channel, 1, noop());
    // A later bare join must not overwrite the stored descriptor.
    registry.add(&Channel::new("trades"), 2, noop());

    let active = registry.active_channels();

    assert_eq!(active, vec![channel]);
}

#[test]
fn given_multiple_channels_then_all_active_channels_listed() {
    let mut registry = SubscriptionRegistry::new();
    registry.add(&Channel::new("ticker.BTC"), 1, noop());
    registry.add(&Channel::new("trades"), 2, noop());

    let mut names: Vec<String> = registry
        .active_channels()
        .into_iter()
        .map(|c| c.name)
        .collect();
    names.sort();

    assert_eq!(names, vec!["ticker.BTC", "trades"]);
}
