//! Connection manager: the actor that owns the transport.
//!
//! One task drives everything: it connects, splits the socket, serves
//! handle commands, dispatches inbound frames, and walks the reconnect
//! state machine when the transport drops. The routing tables live
//! inside the actor, so nothing here is shared or locked except the
//! state snapshot handles read from.
//!
//! State machine: `disconnected → connecting → connected →
//! (error | disconnected) → reconnecting → connecting → …`. Reconnect
//! pacing is a constant interval (no growth, no jitter), optionally
//! bounded by a total elapsed window, after which the manager settles
//! in `disconnected`.

use crate::client::correlator::RequestCorrelator;
use crate::client::dispatcher::dispatch;
use crate::client::pipeline::SendPipeline;
use crate::client::registry::SubscriptionRegistry;
use crate::client::{CallbackId, ChanCallback, ConnectionState, StateCallback};
use crate::config::{ClientConfig, ReconnectPolicy};
use crate::error::protocol::ProtocolError;
use crate::protocol::{self, Channel, Request, SubscriptionParams};
use crate::{SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD};

use common::ErrorLocation;

use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use futures_util::StreamExt;
use futures_util::stream::SplitSink;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use tokio::time::sleep as TokioSleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// One channel/callback pair from a subscribe call.
pub(crate) struct SubscribeEntry {
    pub(crate) channel: Channel,
    pub(crate) callback_id: CallbackId,
    pub(crate) callback: ChanCallback,
}

/// Commands handles submit to the actor.
pub(crate) enum ClientCommand {
    Subscribe {
        entries: Vec<SubscribeEntry>,
    },
    Unsubscribe {
        bindings: Vec<(Channel, CallbackId)>,
    },
    Send {
        method: String,
        params: Value,
        callback: Option<ChanCallback>,
    },
    WatchState {
        callback: StateCallback,
    },
    Shutdown,
}

/// Outcome of one connection attempt.
enum Established {
    Stream(WsStream),
    Failed,
    Shutdown,
}

/// Why a connected session ended.
enum SessionEnd {
    Closed,
    Failed,
    Shutdown,
}

/// Outcome of the between-sessions recovery phase.
enum Recovery {
    Continue,
    Shutdown,
    GiveUp,
}

pub(crate) struct ConnectionManager {
    endpoint: Url,
    config: ClientConfig,
    registry: SubscriptionRegistry,
    correlator: RequestCorrelator,
    pipeline: SendPipeline,
    state_callbacks: Vec<StateCallback>,
    shared_state: Arc<RwLock<ConnectionState>>,
    command_rx: mpsc::Receiver<ClientCommand>,
    reconnect: ExponentialBackoff,
}

impl ConnectionManager {
    pub(crate) fn new(
        endpoint: Url,
        config: ClientConfig,
        shared_state: Arc<RwLock<ConnectionState>>,
        command_rx: mpsc::Receiver<ClientCommand>,
    ) -> Self {
        let pipeline = SendPipeline::new(&config.send_retry);
        let reconnect = reconnect_backoff(&config.reconnect);
        Self {
            endpoint,
            config,
            registry: SubscriptionRegistry::new(),
            correlator: RequestCorrelator::new(),
            pipeline,
            state_callbacks: Vec::new(),
            shared_state,
            command_rx,
            reconnect,
        }
    }

    /// Actor entry point. Runs until shutdown, every handle is
    /// dropped, or a capped reconnect window is exhausted.
    pub(crate) async fn run(mut self) {
        info!("Connection manager started for {}", self.endpoint);

        loop {
            self.transition(ConnectionState::connecting()).await;

            match self.establish().await {
                Established::Shutdown => break,
                Established::Failed => {
                    self.transition(ConnectionState::error()).await;
                    match self.recover().await {
                        Recovery::Continue => {}
                        Recovery::Shutdown | Recovery::GiveUp => break,
                    }
                }
                Established::Stream(stream) => {
                    self.transition(ConnectionState::connected()).await;
                    self.reconnect.reset();

                    match self.run_session(stream).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Failed => {
                            self.transition(ConnectionState::error()).await;
                            match self.recover().await {
                                Recovery::Continue => {}
                                Recovery::Shutdown | Recovery::GiveUp => break,
                            }
                        }
                        SessionEnd::Closed => match self.recover().await {
                            Recovery::Continue => {}
                            Recovery::Shutdown | Recovery::GiveUp => break,
                        },
                    }
                }
            }
        }

        self.transition(ConnectionState::disconnected()).await;
        info!("Connection manager stopped");
    }

    /// Drive one connection attempt, serving commands while it is in
    /// flight.
    async fn establish(&mut self) -> Established {
        info!("Connecting to {}", self.endpoint);

        let connect = connect_async(self.endpoint.as_str().to_owned());
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok((stream, _response)) => Established::Stream(stream),
                        Err(e) => {
                            error!("Connection attempt to {} failed: {e}", self.endpoint);
                            Established::Failed
                        }
                    };
                }
                command = self.command_rx.recv() => {
                    if self.handle_offline_command(command) {
                        return Established::Shutdown;
                    }
                }
            }
        }
    }

    /// Serve one connected lifetime of the transport.
    async fn run_session(&mut self, stream: WsStream) -> SessionEnd {
        let (mut sink, mut source) = stream.split();

        if self.config.resubscribe_on_reconnect {
            for channel in self.registry.active_channels() {
                info!("Announcing subscription to '{}'", channel.name);
                self.announce(&mut sink, SUBSCRIBE_METHOD, channel).await;
            }
        }

        loop {
            let next_retry = self.pipeline.next_due();

            tokio::select! {
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str()),
                    Some(Ok(Message::Close(_))) => {
                        info!("Server closed the connection");
                        return SessionEnd::Closed;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Ignoring binary frame on a text protocol");
                    }
                    Some(Ok(_)) => {
                        // Ping/pong, handled by the transport.
                    }
                    Some(Err(e)) => {
                        error!("Transport read failed: {e}");
                        return SessionEnd::Failed;
                    }
                    None => {
                        info!("Transport stream ended");
                        return SessionEnd::Closed;
                    }
                },
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        debug!("All client handles dropped, stopping");
                        return SessionEnd::Shutdown;
                    };
                    if self.apply_command(command, &mut sink).await {
                        return SessionEnd::Shutdown;
                    }
                },
                _ = tokio::time::sleep_until(next_retry.unwrap_or_else(Instant::now)),
                    if next_retry.is_some() =>
                {
                    self.pipeline.flush_due(&mut sink).await;
                }
            }
        }
    }

    /// Between sessions: abandon in-flight work, wait out the policy
    /// delay (still serving commands), then announce the retry.
    async fn recover(&mut self) -> Recovery {
        let abandoned = self.correlator.clear();
        if abandoned > 0 {
            debug!("Abandoned {abandoned} pending requests");
        }
        self.pipeline.clear();

        self.transition(ConnectionState::disconnected()).await;

        let Some(delay) = self.reconnect.next_backoff() else {
            warn!("Reconnect window exhausted for {}, giving up", self.endpoint);
            return Recovery::GiveUp;
        };

        if self.idle(delay).await {
            return Recovery::Shutdown;
        }

        self.transition(ConnectionState::reconnecting()).await;
        Recovery::Continue
    }

    /// Wait out the reconnect delay while still serving commands.
    /// Returns `true` on shutdown.
    async fn idle(&mut self, delay: Duration) -> bool {
        let sleeper = TokioSleep(delay);
        tokio::pin!(sleeper);

        loop {
            tokio::select! {
                _ = &mut sleeper => return false,
                command = self.command_rx.recv() => {
                    if self.handle_offline_command(command) {
                        return true;
                    }
                }
            }
        }
    }

    /// Serve a command while no transport is open.
    ///
    /// Registry bookkeeping still happens so callbacks registered now
    /// are live after the next open; the wire calls it would have
    /// produced are dropped, as is any plain send. Returns `true` on
    /// shutdown.
    fn handle_offline_command(&mut self, command: Option<ClientCommand>) -> bool {
        let Some(command) = command else {
            debug!("All client handles dropped, stopping");
            return true;
        };

        match command {
            ClientCommand::Shutdown => return true,
            ClientCommand::Subscribe { entries } => {
                for entry in entries {
                    self.registry
                        .add(&entry.channel, entry.callback_id, entry.callback);
                }
            }
            ClientCommand::Unsubscribe { bindings } => {
                for (channel, callback_id) in bindings {
                    self.registry.remove(&channel.name, callback_id);
                }
            }
            ClientCommand::Send { method, .. } => {
                debug!("Dropping send of '{method}' while disconnected");
            }
            ClientCommand::WatchState { callback } => {
                self.state_callbacks.push(callback);
            }
        }
        false
    }

    /// Serve a command on an open transport. Returns `true` on
    /// shutdown.
    async fn apply_command(&mut self, command: ClientCommand, sink: &mut WsSink) -> bool {
        match command {
            ClientCommand::Shutdown => return true,
            ClientCommand::Subscribe { entries } => {
                for entry in entries {
                    let SubscribeEntry {
                        channel,
                        callback_id,
                        callback,
                    } = entry;
                    let first = self.registry.add(&channel, callback_id, callback);
                    if first {
                        self.announce(sink, SUBSCRIBE_METHOD, channel).await;
                    }
                }
            }
            ClientCommand::Unsubscribe { bindings } => {
                for (channel, callback_id) in bindings {
                    let emptied = self.registry.remove(&channel.name, callback_id);
                    if emptied {
                        self.announce(sink, UNSUBSCRIBE_METHOD, channel).await;
                    }
                }
            }
            ClientCommand::Send {
                method,
                params,
                callback,
            } => {
                self.submit(sink, method, params, callback).await;
            }
            ClientCommand::WatchState { callback } => {
                self.state_callbacks.push(callback);
            }
        }
        false
    }

    /// Send a subscribe or unsubscribe call for one channel. No
    /// response callback is registered; the ack routes as an unknown
    /// id and is dropped.
    async fn announce(&mut self, sink: &mut WsSink, method: &str, channel: Channel) {
        let params = SubscriptionParams {
            channels: vec![channel],
        };
        match serde_json::to_value(&params) {
            Ok(params) => self.submit(sink, method.to_string(), params, None).await,
            Err(e) => {
                let error = ProtocolError::Encode {
                    message: format!("Failed to encode subscription params: {e}"),
                    location: ErrorLocation::caller(),
                };
                warn!("{error}");
            }
        }
    }

    /// Assign an id, encode, and attempt transmission.
    ///
    /// The response callback, when present, is registered after the
    /// attempt, so a write that failed (and is retrying, or gave up)
    /// still leaves a pending entry behind.
    async fn submit(
        &mut self,
        sink: &mut WsSink,
        method: String,
        params: Value,
        callback: Option<ChanCallback>,
    ) {
        let id = self.correlator.fresh_id();
        let request = Request::new(method, id, params);

        match protocol::encode_request(&request) {
            Ok(body) => self.pipeline.transmit(sink, id, body).await,
            Err(e) => warn!("{e}"),
        }

        if let Some(callback) = callback {
            self.correlator.register(id, callback);
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match protocol::decode_frame(text) {
            Ok(frame) => dispatch(frame, &mut self.registry, &mut self.correlator),
            Err(e) => warn!("{e}"),
        }
    }

    /// Publish a state change: update the shared snapshot, then invoke
    /// every state callback in registration order. Consecutive
    /// duplicates are suppressed.
    async fn transition(&mut self, next: ConnectionState) {
        {
            let mut current = self.shared_state.write().await;
            if *current == next {
                return;
            }
            *current = next;
        }

        info!("Connection state: {}", next.status);
        for callback in self.state_callbacks.iter_mut() {
            callback(next);
        }
    }
}

/// Constant-interval pacing: the same delay before every attempt,
/// optionally bounded by a total elapsed window.
fn reconnect_backoff(policy: &ReconnectPolicy) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: policy.delay(),
        max_interval: policy.delay(),
        multiplier: 1.0,
        randomization_factor: 0.0,
        max_elapsed_time: policy.max_elapsed(),
        ..ExponentialBackoff::default()
    }
}
