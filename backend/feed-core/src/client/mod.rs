//! Multiplexed, self-healing client for the feed protocol.
//!
//! Many independent consumers share one persistent WebSocket: they
//! subscribe to named channels for pushes and issue request/response
//! calls, while the transport drops and reconnects underneath them.
//!
//! # Architecture
//!
//! A single actor task owns the transport, the subscription registry,
//! the pending-request table, and the send pipeline. The cloneable
//! [`FeedClient`] handle submits commands over a bounded channel; the
//! only shared cell is the connection-state snapshot. All dispatch,
//! including user callbacks, runs on the actor task, so inbound frames
//! are handled strictly in arrival order and no locks guard the
//! routing tables.
//!
//! # Protocol
//!
//! See [`crate::protocol`] for the wire envelopes. Channel membership
//! is reference-counted: `private/subscribe` goes out when a channel
//! gains its first callback, `private/unsubscribe` when it loses its
//! last one.
//!
//! # Failure model
//!
//! Transport failures never reach callers as errors. A drop abandons
//! pending requests, the manager reconnects after a fixed delay, and
//! sends issued while disconnected are dropped, not queued. Handle
//! methods fail fast only on structural misuse (bad endpoint, or use
//! after shutdown).

mod connection;
pub(crate) mod correlator;
pub(crate) mod dispatcher;
mod handle;
pub(crate) mod pipeline;
pub(crate) mod registry;
mod state;

pub use handle::{FeedClient, Subscription};
pub use state::{ConnectionState, ConnectionStatus};

use serde_json::Value;

/// Callback invoked with channel push data or a request's result.
pub type ChanCallback = Box<dyn FnMut(Value) + Send>;

/// Callback invoked on every connection-state transition.
pub type StateCallback = Box<dyn FnMut(ConnectionState) + Send>;

/// Identifies one registered callback so unsubscribe removes exactly
/// the instance it registered.
pub(crate) type CallbackId = u64;
