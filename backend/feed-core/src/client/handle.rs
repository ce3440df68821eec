//! Public client handle and the subscription guard.
//!
//! The handle is a thin, cloneable front over the connection actor:
//! every operation becomes a command on a bounded channel. Handles
//! stay valid across transport drops; they only fail once the actor
//! itself has stopped.

use crate::client::connection::{ClientCommand, ConnectionManager, SubscribeEntry};
use crate::client::{CallbackId, ChanCallback, ConnectionState};
use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::error::client::ClientError;
use crate::protocol::Channel;

use common::ErrorLocation;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::debug;
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::{RwLock, mpsc};
use tokio::time::sleep as TokioSleep;
use url::Url;

/// Command queue depth between handles and the actor.
const COMMAND_QUEUE_DEPTH: usize = 100;

/// Poll interval for [`FeedClient::wait_until_connected`].
const CONNECTED_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cloneable handle to one feed client instance.
///
/// `connect` returns as soon as the connection actor is spawned; the
/// connection itself is established in the background and repaired
/// after every drop. Use [`on_state_change`](Self::on_state_change) or
/// [`wait_until_connected`](Self::wait_until_connected) to observe
/// progress.
///
/// # Examples
///
/// ```no_run
/// use feed_core::client::FeedClient;
/// use feed_core::protocol::Channel;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = FeedClient::connect("ws://127.0.0.1:3000").await?;
///     client.wait_until_connected().await;
///
///     let subscription = client
///         .subscribe(vec![(
///             Channel::new("ticks"),
///             Box::new(|data| println!("tick: {data}")),
///         )])
///         .await?;
///
///     // ... later
///     subscription.unsubscribe().await;
///     client.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct FeedClient {
    command_tx: mpsc::Sender<ClientCommand>,
    state: Arc<RwLock<ConnectionState>>,
    next_callback_id: Arc<AtomicU64>,
}

impl FeedClient {
    /// Connect with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not a valid `ws`/`wss` endpoint.
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        Self::connect_with(url, ClientConfig::default()).await
    }

    /// Connect with an explicit configuration.
    ///
    /// Spawns the connection actor and returns immediately; connecting,
    /// and reconnecting after drops, happens in the background.
    ///
    /// # Arguments
    ///
    /// * `url` - The `ws://` or `wss://` endpoint
    /// * `config` - Reconnect/retry policies and replay behavior
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails validation or `url` is not
    /// a valid `ws`/`wss` endpoint.
    pub async fn connect_with(url: &str, config: ClientConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let endpoint = parse_endpoint(url)?;

        let state = Arc::new(RwLock::new(ConnectionState::disconnected()));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let manager = ConnectionManager::new(endpoint, config, Arc::clone(&state), command_rx);
        TokioSpawn(manager.run());

        Ok(Self {
            command_tx,
            state,
            next_callback_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Subscribe a batch of callbacks to their channels.
    ///
    /// Channels gaining their first subscriber get a
    /// `private/subscribe` call on the wire (dropped if disconnected;
    /// replayed on the next open when replay is enabled). The returned
    /// guard tears down exactly the callbacks registered here.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Detached`] if the client has shut down.
    pub async fn subscribe(
        &self,
        entries: Vec<(Channel, ChanCallback)>,
    ) -> Result<Subscription, ClientError> {
        let mut bindings = Vec::with_capacity(entries.len());
        let mut subscribe_entries = Vec::with_capacity(entries.len());

        for (channel, callback) in entries {
            let callback_id = self.next_callback_id.fetch_add(1, Ordering::Relaxed);
            bindings.push((channel.clone(), callback_id));
            subscribe_entries.push(SubscribeEntry {
                channel,
                callback_id,
                callback,
            });
        }

        self.command_tx
            .send(ClientCommand::Subscribe {
                entries: subscribe_entries,
            })
            .await
            .map_err(|_| detached())?;

        Ok(Subscription {
            bindings,
            command_tx: self.command_tx.clone(),
        })
    }

    /// Issue a request. Fire-and-forget unless `callback` is given, in
    /// which case it receives the matching response's `result` exactly
    /// once.
    ///
    /// Sends issued while disconnected are dropped, not queued, and
    /// register no callback.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Detached`] if the client has shut down.
    pub async fn send(
        &self,
        method: impl Into<String>,
        params: Value,
        callback: Option<ChanCallback>,
    ) -> Result<(), ClientError> {
        self.command_tx
            .send(ClientCommand::Send {
                method: method.into(),
                params,
                callback,
            })
            .await
            .map_err(|_| detached())
    }

    /// Register a callback for connection-state transitions.
    ///
    /// Callbacks run on the actor task, synchronously on each change,
    /// in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Detached`] if the client has shut down.
    pub async fn on_state_change<F>(&self, callback: F) -> Result<(), ClientError>
    where
        F: FnMut(ConnectionState) + Send + 'static,
    {
        self.command_tx
            .send(ClientCommand::WatchState {
                callback: Box::new(callback),
            })
            .await
            .map_err(|_| detached())
    }

    /// Current connection-state snapshot.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_connected
    }

    /// Poll until the client reports connected.
    ///
    /// Returns `false` if the client shuts down before that happens.
    pub async fn wait_until_connected(&self) -> bool {
        loop {
            if self.state.read().await.is_connected {
                return true;
            }
            if self.command_tx.is_closed() {
                debug!("Stopped waiting for connection: client is shut down");
                return false;
            }
            TokioSleep(CONNECTED_POLL_INTERVAL).await;
        }
    }

    /// Stop the connection actor: the transport is dropped, pending
    /// requests and timers are cancelled, and a final `disconnected`
    /// is broadcast. Subsequent handle calls return
    /// [`ClientError::Detached`].
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(ClientCommand::Shutdown).await;
    }
}

/// Teardown guard for one subscribe call.
///
/// `unsubscribe()` removes exactly the callback instances that call
/// registered; channels whose refcount reaches zero get a
/// `private/unsubscribe` on the wire. Dropping the guard without
/// consuming it leaves the subscriptions in place for the client's
/// lifetime.
pub struct Subscription {
    bindings: Vec<(Channel, CallbackId)>,
    command_tx: mpsc::Sender<ClientCommand>,
}

impl Subscription {
    pub async fn unsubscribe(self) {
        // Nothing to tear down if the client is already gone.
        let _ = self
            .command_tx
            .send(ClientCommand::Unsubscribe {
                bindings: self.bindings,
            })
            .await;
    }
}

fn detached() -> ClientError {
    ClientError::Detached {
        message: "Client connection task is no longer running".to_string(),
        location: ErrorLocation::caller(),
    }
}

fn parse_endpoint(url: &str) -> Result<Url, ClientError> {
    let endpoint = Url::parse(url)?;
    match endpoint.scheme() {
        "ws" | "wss" => Ok(endpoint),
        other => Err(ClientError::Endpoint {
            message: format!("Unsupported scheme '{other}' in '{url}' (expected ws or wss)"),
            location: ErrorLocation::caller(),
        }),
    }
}
