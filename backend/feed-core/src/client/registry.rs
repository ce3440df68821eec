//! Reference-counted channel subscriptions.
//!
//! Channels are identified by name alone. The registry only decides
//! *when* a subscribe or unsubscribe call is due (0→1 and 1→0 refcount
//! transitions); issuing the call is the connection manager's job.

use crate::client::{CallbackId, ChanCallback};
use crate::protocol::Channel;

use std::collections::HashMap;

use serde_json::Value;

struct RegisteredCallback {
    id: CallbackId,
    callback: ChanCallback,
}

struct ChannelEntry {
    /// First subscriber's channel value, kept so `args` survive for
    /// reconnect replay.
    channel: Channel,
    callbacks: Vec<RegisteredCallback>,
}

pub(crate) struct SubscriptionRegistry {
    channels: HashMap<String, ChannelEntry>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Append a callback to the channel's entry.
    ///
    /// Returns `true` when this was the channel's first callback, i.e.
    /// a `private/subscribe` call is due. Joining a channel that already
    /// has subscribers is silent.
    pub(crate) fn add(&mut self, channel: &Channel, id: CallbackId, callback: ChanCallback) -> bool {
        let entry = self
            .channels
            .entry(channel.name.clone())
            .or_insert_with(|| ChannelEntry {
                channel: channel.clone(),
                callbacks: Vec::new(),
            });

        let was_empty = entry.callbacks.is_empty();
        entry.callbacks.push(RegisteredCallback { id, callback });
        was_empty
    }

    /// Remove exactly the callback instance registered under `id`.
    ///
    /// Returns `true` when the channel's entry became empty, i.e. a
    /// `private/unsubscribe` call is due. Unknown names or ids are a
    /// no-op.
    pub(crate) fn remove(&mut self, name: &str, id: CallbackId) -> bool {
        let Some(entry) = self.channels.get_mut(name) else {
            return false;
        };

        let Some(position) = entry.callbacks.iter().position(|c| c.id == id) else {
            return false;
        };
        entry.callbacks.remove(position);

        if entry.callbacks.is_empty() {
            self.channels.remove(name);
            return true;
        }
        false
    }

    /// Invoke every callback subscribed to `name`, in registration
    /// order, with a copy of `data`. Returns how many ran.
    pub(crate) fn deliver(&mut self, name: &str, data: &Value) -> usize {
        let Some(entry) = self.channels.get_mut(name) else {
            return 0;
        };

        for registered in entry.callbacks.iter_mut() {
            (registered.callback)(data.clone());
        }
        entry.callbacks.len()
    }

    /// Channels that currently have at least one subscriber. Feeds
    /// reconnect replay; order is unspecified.
    pub(crate) fn active_channels(&self) -> Vec<Channel> {
        self.channels
            .values()
            .map(|entry| entry.channel.clone())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, name: &str) -> usize {
        self.channels
            .get(name)
            .map(|entry| entry.callbacks.len())
            .unwrap_or(0)
    }
}
