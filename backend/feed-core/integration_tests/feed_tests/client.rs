use crate::feed_tests::helpers::{
    capped_reconnect_config, rapid_reconnect_config, recording_callback, start_feed_server,
    steady_config, wait_for, wait_until_disconnected,
};

use feed_core::client::{ConnectionStatus, FeedClient};
use feed_core::config::ClientConfig;
use feed_core::error::CoreError;
use feed_core::error::client::ClientError;
use feed_core::error::config::ConfigError;
use feed_core::protocol::Channel;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

/// Asserts `expected` appears within `observed` in order, allowing other
/// statuses in between.
fn assert_contains_in_order(observed: &[ConnectionStatus], expected: &[ConnectionStatus]) {
    let mut remaining = observed.iter();
    for want in expected {
        assert!(
            remaining.any(|status| status == want),
            "Expected statuses {expected:?} in order, observed {observed:?}"
        );
    }
}

/// **VALUE**: Verifies the full subscribe path: wire announcement, push
/// routing, and the exact request frame layout.
///
/// **WHY THIS MATTERS**: This is the core loop of the whole client. Every
/// consumer starts with a subscribe and lives off the pushes that follow.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The subscribe announcement never reaches the wire
/// - The request frame drifts from the `{method, jsonrpc, id, params}` shape
/// - Request ids leave the `[1, 1000000]` cycle
/// - Push frames stop reaching the subscribed callback
#[tokio::test]
async fn given_subscribed_channel_when_server_pushes_then_callback_receives_data() {
    // GIVEN: a connected client with one channel subscription
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), steady_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);

    let (recorded, callback) = recording_callback();
    let _subscription = client
        .subscribe(vec![(Channel::new("ticker.BTC"), callback)])
        .await
        .expect("Failed to subscribe");

    // THEN: the announcement carries the exact request layout
    let request = server.wait_for_request("private/subscribe").await;
    assert_eq!(request["jsonrpc"], "2.0");
    assert_eq!(
        request["params"],
        json!({"channels": [{"name": "ticker.BTC"}]})
    );
    let id = request["id"].as_u64().expect("Request id must be numeric");
    assert!(
        (1..=1_000_000).contains(&id),
        "Request id {id} outside the allowed cycle"
    );

    // WHEN: the server pushes on the subscribed channel
    server.push("ticker.BTC", json!({"price": 97000})).await;

    // THEN: the callback receives exactly that payload
    wait_for(|| !recorded.lock().unwrap().is_empty(), "push delivery").await;
    assert_eq!(*recorded.lock().unwrap(), vec![json!({"price": 97000})]);
}

#[tokio::test]
async fn given_two_subscribers_when_push_arrives_then_both_receive_in_order() {
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), steady_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);

    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&order);
    let second = Arc::clone(&order);
    let _subscription_a = client
        .subscribe(vec![(
            Channel::new("trades"),
            Box::new(move |_| first.lock().unwrap().push("first")),
        )])
        .await
        .expect("Failed to subscribe first callback");
    let _subscription_b = client
        .subscribe(vec![(
            Channel::new("trades"),
            Box::new(move |_| second.lock().unwrap().push("second")),
        )])
        .await
        .expect("Failed to subscribe second callback");

    server.wait_for_request("private/subscribe").await;
    server.push("trades", json!([1, 2, 3])).await;

    wait_for(|| order.lock().unwrap().len() == 2, "fan-out to both").await;
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

// -------------------------------------------------------------------------- //

/// **VALUE**: Verifies subscriptions are reference counted per channel name.
///
/// **WHY THIS MATTERS**: Multiple consumers share one wire subscription. A
/// subscribe frame per consumer multiplies server-side state; an unsubscribe
/// while consumers remain silently starves them.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - A second subscriber triggers a second `private/subscribe`
/// - Removing one of two subscribers triggers `private/unsubscribe`
/// - The last removal fails to unsubscribe on the wire
#[tokio::test]
async fn given_shared_channel_when_subscribers_come_and_go_then_wire_calls_only_at_edges() {
    // GIVEN: two subscribers on the same channel
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), steady_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);

    let (_, first_callback) = recording_callback();
    let (_, second_callback) = recording_callback();
    let subscription_a = client
        .subscribe(vec![(Channel::new("ticker.BTC"), first_callback)])
        .await
        .expect("Failed to subscribe first callback");
    let subscription_b = client
        .subscribe(vec![(Channel::new("ticker.BTC"), second_callback)])
        .await
        .expect("Failed to subscribe second callback");

    server.wait_for_request("private/subscribe").await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        server.requests_with_method("private/subscribe").len(),
        1,
        "Joining an already subscribed channel must stay off the wire"
    );

    // WHEN: one of the two subscribers leaves
    subscription_a.unsubscribe().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // THEN: no unsubscribe goes out while a subscriber remains
    assert!(server.requests_with_method("private/unsubscribe").is_empty());

    // WHEN: the last subscriber leaves
    subscription_b.unsubscribe().await;

    // THEN: exactly one unsubscribe frame is sent
    let request = server.wait_for_request("private/unsubscribe").await;
    assert_eq!(
        request["params"],
        json!({"channels": [{"name": "ticker.BTC"}]})
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.requests_with_method("private/unsubscribe").len(), 1);
}

#[tokio::test]
async fn given_batch_subscribe_of_two_channels_then_each_announced() {
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), steady_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);

    let (_, first_callback) = recording_callback();
    let (_, second_callback) = recording_callback();
    let _subscription = client
        .subscribe(vec![
            (Channel::new("ticker.BTC"), first_callback),
            (Channel::new("trades"), second_callback),
        ])
        .await
        .expect("Failed to subscribe batch");

    let requests = server.wait_for_requests("private/subscribe", 2).await;
    let mut names: Vec<String> = requests
        .iter()
        .map(|request| {
            request["params"]["channels"][0]["name"]
                .as_str()
                .expect("Channel name must be a string")
                .to_string()
        })
        .collect();
    names.sort();
    assert_eq!(names, vec!["ticker.BTC", "trades"]);
}

// -------------------------------------------------------------------------- //

/// **VALUE**: Verifies request/response correlation end to end, including
/// duplicate suppression.
///
/// **WHY THIS MATTERS**: Response callbacks are one-shot by contract. Reconnect
/// churn can replay frames, and a callback firing twice double-applies state.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The response never reaches the registered callback
/// - Correlation keys on something other than the request id
/// - A duplicate response frame fires the callback again
#[tokio::test]
async fn given_request_with_callback_when_server_responds_then_callback_fires_once() {
    // GIVEN: a connected client with one request in flight
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), steady_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);

    let (recorded, callback) = recording_callback();
    client
        .send("public/get_time", json!({}), Some(callback))
        .await
        .expect("Failed to send request");

    let request = server.wait_for_request("public/get_time").await;
    let id = request["id"].as_u64().expect("Request id must be numeric");

    // WHEN: the server answers, then replays the same response
    server.respond(id, json!("pong")).await;
    wait_for(|| !recorded.lock().unwrap().is_empty(), "response delivery").await;
    server.respond(id, json!("pong")).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // THEN: the callback observed exactly one delivery
    assert_eq!(*recorded.lock().unwrap(), vec![json!("pong")]);
}

#[tokio::test]
async fn given_fire_and_forget_send_then_request_reaches_wire() {
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), steady_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);

    client
        .send("public/set_heartbeat", json!({"interval": 30}), None)
        .await
        .expect("Failed to send request");

    let request = server.wait_for_request("public/set_heartbeat").await;
    assert_eq!(request["params"], json!({"interval": 30}));
}

// -------------------------------------------------------------------------- //

/// **VALUE**: Verifies sends while disconnected are dropped, not queued.
///
/// **WHY THIS MATTERS**: Feed requests are only meaningful against a live
/// session. Queueing them would replay stale operations onto a future session
/// the caller never intended to target.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Offline sends buffer up and flush on reconnect
/// - An offline send still registers its response callback
/// - The client crashes on a send without a transport
#[tokio::test]
async fn given_disconnected_client_when_send_then_dropped_silently() {
    // GIVEN: a client whose session has dropped, with reconnect far away
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), steady_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);
    server.close_session().await;
    wait_until_disconnected(&client).await;

    // WHEN: a request is sent while disconnected
    let (recorded, callback) = recording_callback();
    client
        .send("public/get_time", json!({}), Some(callback))
        .await
        .expect("Send on a live handle must be accepted");
    tokio::time::sleep(Duration::from_millis(300)).await;

    // THEN: nothing reaches the wire and the callback stays silent
    assert!(server.requests_with_method("public/get_time").is_empty());
    assert!(recorded.lock().unwrap().is_empty());
    assert_eq!(server.connection_count(), 1);
}

/// **VALUE**: Verifies the client heals a dropped transport and replays its
/// subscriptions, arguments included.
///
/// **WHY THIS MATTERS**: Self-healing is the reason this client exists.
/// Consumers keep their callbacks; the wire subscription must follow them onto
/// the new session or every reconnect silently kills the feed.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - No new connection is attempted after a server-side close
/// - Replay skips channels or drops their `args`
/// - Pushes on the new session no longer reach the old callbacks
#[tokio::test]
async fn given_dropped_transport_when_reconnected_then_subscriptions_replayed() {
    // GIVEN: a subscribed client with a fast reconnect policy
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), rapid_reconnect_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);

    let (recorded, callback) = recording_callback();
    let _subscription = client
        .subscribe(vec![(
            Channel::with_args("trades", json!({"depth": 10})),
            callback,
        )])
        .await
        .expect("Failed to subscribe");
    server.wait_for_request("private/subscribe").await;

    // WHEN: the server drops the session
    server.close_session().await;
    server.wait_for_connections(2).await;

    // THEN: the subscription is replayed with the original args
    let requests = server.wait_for_requests("private/subscribe", 2).await;
    assert_eq!(
        requests[1]["params"],
        json!({"channels": [{"name": "trades", "args": {"depth": 10}}]})
    );

    // THEN: pushes on the new session still reach the callback
    server.push("trades", json!([42])).await;
    wait_for(
        || !recorded.lock().unwrap().is_empty(),
        "push delivery after reconnect",
    )
    .await;
    assert_eq!(*recorded.lock().unwrap(), vec![json!([42])]);
}

#[tokio::test]
async fn given_subscription_made_while_disconnected_then_announced_on_next_open() {
    // GIVEN: a disconnected client with a fast reconnect policy
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), rapid_reconnect_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);
    server.close_session().await;
    wait_until_disconnected(&client).await;

    // WHEN: a channel is subscribed while offline
    let (recorded, callback) = recording_callback();
    let _subscription = client
        .subscribe(vec![(Channel::new("ticker.BTC"), callback)])
        .await
        .expect("Failed to subscribe");

    // THEN: the next session announces it without a caller retry
    server.wait_for_connections(2).await;
    let request = server.wait_for_request("private/subscribe").await;
    assert_eq!(
        request["params"],
        json!({"channels": [{"name": "ticker.BTC"}]})
    );

    server.push("ticker.BTC", json!({"price": 1})).await;
    wait_for(|| !recorded.lock().unwrap().is_empty(), "push delivery").await;
}

// -------------------------------------------------------------------------- //

/// **VALUE**: Verifies the optional reconnect cap: once the window is spent,
/// the client stops retrying and settles in `disconnected`.
///
/// **WHY THIS MATTERS**: Retry-forever is the right default, but callers that
/// opt into a cap are failing over or tearing down; a client that keeps
/// dialing past its window holds work open against a dead endpoint.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The capped window never expires and the client retries forever
/// - Giving up settles on a state other than `disconnected`
/// - Handles stay attached (no `Detached` error) after the actor stopped
#[tokio::test]
async fn given_capped_reconnect_window_when_attempts_keep_failing_then_client_gives_up() {
    // GIVEN: an endpoint nobody answers on and a finite reconnect window
    let client = FeedClient::connect_with("ws://127.0.0.1:9", capped_reconnect_config())
        .await
        .expect("Failed to start client");

    // WHEN: every attempt fails until the window is spent, the actor
    // stops; poll until the handle observes that.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match client.send("public/get_time", json!({}), None).await {
            Err(error) => {
                assert!(matches!(error, ClientError::Detached { .. }));
                break;
            }
            Ok(()) => {
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "Client never gave up within its reconnect window"
                );
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    // THEN: the client settled in disconnected, not stuck mid-retry
    assert_eq!(client.state().await.status, ConnectionStatus::Disconnected);
    assert!(!client.is_connected().await);
    assert!(!client.wait_until_connected().await);
}

// -------------------------------------------------------------------------- //

/// **VALUE**: Verifies the state stream seen by observers across a full
/// drop/heal/shutdown cycle.
///
/// **WHY THIS MATTERS**: UIs and supervisors key directly off these
/// transitions. Out-of-order or duplicate notifications make "is the feed up"
/// unanswerable.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Recovery skips `reconnecting` or reports states out of order
/// - The same state is broadcast twice in a row
/// - Shutdown ends on anything but `disconnected`
#[tokio::test]
async fn given_drop_heal_shutdown_cycle_then_states_observed_in_order() {
    // GIVEN: a client with a state observer attached
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), rapid_reconnect_config())
        .await
        .expect("Failed to start client");

    let states: Arc<Mutex<Vec<ConnectionStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    client
        .on_state_change(move |state| sink.lock().unwrap().push(state.status))
        .await
        .expect("Failed to register state observer");
    assert!(client.wait_until_connected().await);
    assert!(client.state().await.is_connected);

    // WHEN: the server drops the session and the client heals
    server.close_session().await;
    let healed = Arc::clone(&states);
    wait_for(
        || {
            healed
                .lock()
                .unwrap()
                .iter()
                .filter(|status| **status == ConnectionStatus::Connected)
                .count()
                >= 2
        },
        "second connected transition",
    )
    .await;

    // WHEN: the client is shut down
    client.shutdown().await;
    let settled = Arc::clone(&states);
    wait_for(
        || {
            settled.lock().unwrap().last() == Some(&ConnectionStatus::Disconnected)
        },
        "final disconnected broadcast",
    )
    .await;

    // THEN: the drop/heal cycle appears in order, with no duplicates
    let observed = states.lock().unwrap().clone();
    assert_contains_in_order(
        &observed,
        &[
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Reconnecting,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
        ],
    );
    for pair in observed.windows(2) {
        assert_ne!(
            pair[0], pair[1],
            "Duplicate adjacent state in {observed:?}"
        );
    }
}

// -------------------------------------------------------------------------- //

/// **VALUE**: Verifies one bad frame cannot take the session down.
///
/// **WHY THIS MATTERS**: The client shares one transport across every consumer.
/// If a malformed or unroutable frame killed the read loop, a single server
/// hiccup would reset every subscription in the process.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - A non-JSON frame errors the session instead of being dropped
/// - An unroutable frame or unknown response id panics the actor
/// - A push for an unsubscribed channel disturbs live subscriptions
#[tokio::test]
async fn given_malformed_and_unroutable_frames_then_session_survives() {
    // GIVEN: a connected client with a live subscription
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), steady_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);

    let (recorded, callback) = recording_callback();
    let _subscription = client
        .subscribe(vec![(Channel::new("ticker.BTC"), callback)])
        .await
        .expect("Failed to subscribe");
    server.wait_for_request("private/subscribe").await;

    // WHEN: the server sends garbage, unroutable frames, and strays
    server.send_raw("not json at all {{").await;
    server.send_raw(r#"{"jsonrpc":"2.0","method":"heartbeat"}"#).await;
    server.push("ghost.channel", json!(1)).await;
    server.respond(999, json!("stray")).await;

    // THEN: the session survives and a real push still goes through
    server.push("ticker.BTC", json!({"price": 2})).await;
    wait_for(|| !recorded.lock().unwrap().is_empty(), "push delivery").await;
    assert_eq!(*recorded.lock().unwrap(), vec![json!({"price": 2})]);
    assert!(client.is_connected().await);
    assert_eq!(server.connection_count(), 1);
}

// -------------------------------------------------------------------------- //

#[tokio::test]
async fn given_shutdown_client_when_used_then_detached_errors() {
    let server = start_feed_server().await;
    let client = FeedClient::connect_with(&server.url(), steady_config())
        .await
        .expect("Failed to start client");
    assert!(client.wait_until_connected().await);

    client.shutdown().await;

    // The actor drains in the background; poll until the handle detaches.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match client.send("public/get_time", json!({}), None).await {
            Err(error) => {
                assert!(matches!(error, ClientError::Detached { .. }));
                break;
            }
            Ok(()) => {
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "Client never detached after shutdown"
                );
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    let result = client
        .subscribe(vec![(Channel::new("ticker.BTC"), Box::new(|_| {}))])
        .await;
    assert!(matches!(result, Err(ClientError::Detached { .. })));
    assert!(!client.wait_until_connected().await);
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn given_invalid_endpoint_when_connecting_then_endpoint_error() {
    let result = FeedClient::connect("http://127.0.0.1:9").await;
    assert!(matches!(
        result,
        Err(CoreError::Client(ClientError::Endpoint { .. }))
    ));

    let result = FeedClient::connect("not a url").await;
    assert!(matches!(
        result,
        Err(CoreError::Client(ClientError::Endpoint { .. }))
    ));
}

#[tokio::test]
async fn given_invalid_config_when_connecting_then_validation_error() {
    let mut config = ClientConfig::default();
    config.reconnect.delay_ms = 1;

    let result = FeedClient::connect_with("ws://127.0.0.1:9", config).await;

    assert!(matches!(
        result,
        Err(CoreError::Config(ConfigError::ValidationError { .. }))
    ));
}
