//! Outbound write path with bounded retry.
//!
//! A write that fails on an open transport is retried with the same id
//! and body at a fixed spacing, up to the policy bound, then abandoned
//! with a warning. Retries belong to the session that scheduled them:
//! when the transport drops, [`SendPipeline::clear`] cancels whatever
//! is still queued. Callers decide *whether* to send (nothing here
//! checks connection state); this module only moves bytes and keeps
//! the retry schedule.

use crate::config::SendRetryPolicy;
use crate::error::client::ClientError;

use common::ErrorLocation;

use std::time::Duration;

use futures_util::{Sink, SinkExt};
use log::{debug, warn};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Error as TransportError;
use tokio_tungstenite::tungstenite::Message;

/// One failed request waiting for its next attempt.
pub(crate) struct PendingRetry {
    pub(crate) id: u64,
    pub(crate) body: String,
    /// Retry number this entry will perform, 1-based.
    pub(crate) attempt: u32,
    due: Instant,
}

pub(crate) struct SendPipeline {
    max_retries: u32,
    retry_delay: Duration,
    queue: Vec<PendingRetry>,
}

impl SendPipeline {
    pub(crate) fn new(policy: &SendRetryPolicy) -> Self {
        Self {
            max_retries: policy.max_retries,
            retry_delay: policy.delay(),
            queue: Vec::new(),
        }
    }

    /// First transmission attempt for an encoded request.
    ///
    /// Failure is contained: the request is queued for retry (or
    /// abandoned when the policy allows none) and the error is logged,
    /// never returned.
    pub(crate) async fn transmit<S>(&mut self, sink: &mut S, id: u64, body: String)
    where
        S: Sink<Message, Error = TransportError> + Unpin,
    {
        if let Err(e) = sink.send(Message::Text(body.clone().into())).await {
            let error = ClientError::Send {
                message: format!("Failed to transmit request {id}: {e}"),
                location: ErrorLocation::caller(),
            };
            warn!("{error}");
            self.after_failure(id, body, 1);
        }
    }

    /// Re-send every queued entry whose deadline has passed.
    pub(crate) async fn flush_due<S>(&mut self, sink: &mut S)
    where
        S: Sink<Message, Error = TransportError> + Unpin,
    {
        for entry in self.take_due(Instant::now()) {
            match sink.send(Message::Text(entry.body.clone().into())).await {
                Ok(()) => {
                    debug!("Retry {} succeeded for request {}", entry.attempt, entry.id);
                }
                Err(e) => {
                    let error = ClientError::Send {
                        message: format!(
                            "Retry {} failed for request {}: {e}",
                            entry.attempt, entry.id
                        ),
                        location: ErrorLocation::caller(),
                    };
                    warn!("{error}");
                    self.after_failure(entry.id, entry.body, entry.attempt + 1);
                }
            }
        }
    }

    /// Queue the next retry, or give up once the policy bound is hit.
    fn after_failure(&mut self, id: u64, body: String, next_attempt: u32) {
        if next_attempt > self.max_retries {
            warn!(
                "Giving up on request {id} after {} retries",
                self.max_retries
            );
            return;
        }

        debug!(
            "Scheduling retry {next_attempt} for request {id} in {:?}",
            self.retry_delay
        );
        self.queue.push(PendingRetry {
            id,
            body,
            attempt: next_attempt,
            due: Instant::now() + self.retry_delay,
        });
    }

    /// Earliest retry deadline, if anything is queued. Drives the
    /// session select loop's timer arm.
    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.queue.iter().map(|entry| entry.due).min()
    }

    /// Remove and return every entry due at `now`, preserving queue
    /// order.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<PendingRetry> {
        let mut due = Vec::new();
        let mut index = 0;
        while index < self.queue.len() {
            if self.queue[index].due <= now {
                due.push(self.queue.remove(index));
            } else {
                index += 1;
            }
        }
        due
    }

    /// Drop all queued retries. Called when the session that owns them
    /// ends.
    pub(crate) fn clear(&mut self) {
        if !self.queue.is_empty() {
            debug!("Cancelling {} queued retries", self.queue.len());
            self.queue.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_retries(&self) -> usize {
        self.queue.len()
    }
}
