//! Test helpers for feed client integration tests.
//!
//! This module provides a scripted feed server plus utilities for
//! driving the client against it:
//! - Recording every request frame the client sends
//! - Scripting pushes, responses, and session drops
//! - Counting connections to observe reconnect behavior

use feed_core::client::{ChanCallback, FeedClient};
use feed_core::config::ClientConfig;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

/// How long helpers poll before declaring a scenario stuck.
const WAIT_BUDGET: Duration = Duration::from_secs(5);

/// Poll spacing for all wait helpers.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Directive for the currently connected session.
enum SessionCommand {
    Frame(String),
    Close,
}

/// A scripted feed server on an ephemeral local port.
///
/// Accepts any number of sequential connections; scripted frames always
/// go to the most recent session.
pub struct FeedServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
    session: Arc<Mutex<Option<UnboundedSender<SessionCommand>>>>,
}

/// Test helper: Start a feed server and return its handle.
pub async fn start_feed_server() -> FeedServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind feed server");
    let addr = listener
        .local_addr()
        .expect("Failed to read feed server address");

    let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));
    let session: Arc<Mutex<Option<UnboundedSender<SessionCommand>>>> = Arc::new(Mutex::new(None));

    {
        let received = Arc::clone(&received);
        let connections = Arc::clone(&connections);
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                let (command_tx, command_rx) = unbounded_channel();
                *session.lock().unwrap() = Some(command_tx);
                connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(run_session(ws, command_rx, Arc::clone(&received)));
            }
        });
    }

    FeedServer {
        addr,
        received,
        connections,
        session,
    }
}

/// One accepted connection: records inbound text frames, relays
/// scripted commands, stops on close or transport error.
async fn run_session(
    ws: WebSocketStream<TcpStream>,
    mut commands: UnboundedReceiver<SessionCommand>,
    received: Arc<Mutex<Vec<Value>>>,
) {
    let (mut sink, mut source) = ws.split();
    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                        received.lock().unwrap().push(value);
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Some(SessionCommand::Frame(frame)) => {
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Some(SessionCommand::Close) => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                None => break,
            },
        }
    }
}

impl FeedServer {
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Every request frame received so far, across all sessions.
    pub fn requests(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    pub fn requests_with_method(&self, method: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|request| request["method"] == method)
            .collect()
    }

    /// How many WebSocket sessions have been accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Test helper: Poll until at least one request with `method` has
    /// arrived, returning the first.
    pub async fn wait_for_request(&self, method: &str) -> Value {
        self.wait_for_requests(method, 1).await.remove(0)
    }

    /// Test helper: Poll until at least `count` requests with `method`
    /// have arrived, returning all of them.
    pub async fn wait_for_requests(&self, method: &str, count: usize) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + WAIT_BUDGET;
        loop {
            let matching = self.requests_with_method(method);
            if matching.len() >= count {
                return matching;
            }
            if tokio::time::Instant::now() > deadline {
                panic!(
                    "Timed out waiting for {count} '{method}' request(s), saw: {:?}",
                    self.requests()
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Test helper: Poll until at least `count` sessions were accepted.
    pub async fn wait_for_connections(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + WAIT_BUDGET;
        while self.connection_count() < count {
            if tokio::time::Instant::now() > deadline {
                panic!(
                    "Timed out waiting for connection #{count}, saw {}",
                    self.connection_count()
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Test helper: Send a subscription push on the current session.
    pub async fn push(&self, channel: &str, data: Value) {
        let frame = json!({
            "jsonrpc": "2.0",
            "method": "subscription",
            "result": {"channel": channel, "data": data},
        });
        self.send_raw(&frame.to_string()).await;
    }

    /// Test helper: Send a response frame on the current session.
    pub async fn respond(&self, id: u64, result: Value) {
        let frame = json!({"jsonrpc": "2.0", "id": id, "result": result});
        self.send_raw(&frame.to_string()).await;
    }

    /// Test helper: Send a raw text frame on the current session.
    pub async fn send_raw(&self, frame: &str) {
        let _ = self
            .session_sender()
            .await
            .send(SessionCommand::Frame(frame.to_string()));
    }

    /// Test helper: Close the current session from the server side.
    pub async fn close_session(&self) {
        let _ = self.session_sender().await.send(SessionCommand::Close);
    }

    async fn session_sender(&self) -> UnboundedSender<SessionCommand> {
        let deadline = tokio::time::Instant::now() + WAIT_BUDGET;
        loop {
            if let Some(sender) = self.session.lock().unwrap().clone() {
                return sender;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("Timed out waiting for a session to script against");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Config with a reconnect delay far beyond the test budget, so a
/// dropped session stays dropped for the rest of the scenario.
pub fn steady_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.reconnect.delay_ms = 60_000;
    config
}

/// Config that reconnects fast enough to observe within a test.
pub fn rapid_reconnect_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.reconnect.delay_ms = 50;
    config
}

/// Config whose reconnect window closes after a few rapid attempts, so
/// the give-up path is reachable within a test.
pub fn capped_reconnect_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.reconnect.delay_ms = 50;
    config.reconnect.max_elapsed_ms = Some(300);
    config
}

pub type Recorded = Arc<Mutex<Vec<Value>>>;

/// Test helper: Channel callback that appends every delivery to the
/// returned log.
pub fn recording_callback() -> (Recorded, ChanCallback) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    let callback: ChanCallback = Box::new(move |data| sink.lock().unwrap().push(data));
    (recorded, callback)
}

/// Test helper: Poll until `condition` holds.
pub async fn wait_for<F>(mut condition: F, description: &str)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_BUDGET;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for {description}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Test helper: Poll until the client observes its transport drop.
pub async fn wait_until_disconnected(client: &FeedClient) {
    let deadline = tokio::time::Instant::now() + WAIT_BUDGET;
    while client.is_connected().await {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for the client to observe the drop");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
