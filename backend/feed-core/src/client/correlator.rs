//! Pending-request table and request-id allocation.

use crate::client::ChanCallback;

use std::collections::HashMap;

/// Upper bound of the id cycle; request ids live in `[1, REQUEST_ID_SPAN]`.
const REQUEST_ID_SPAN: u64 = 1_000_000;

/// Matches each outbound request id to the callbacks awaiting its
/// response. One-shot: the first matching response consumes the entry.
pub(crate) struct RequestCorrelator {
    pending: HashMap<u64, Vec<ChanCallback>>,
    next_id: u64,
}

impl RequestCorrelator {
    pub(crate) fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate the next request id.
    ///
    /// Monotonic, wrapping back to 1 after [`REQUEST_ID_SPAN`], skipping
    /// ids still awaiting a response so pending ids stay unique.
    pub(crate) fn fresh_id(&mut self) -> u64 {
        loop {
            let id = self.next_id;
            self.next_id = id % REQUEST_ID_SPAN + 1;
            if !self.pending.contains_key(&id) {
                return id;
            }
        }
    }

    pub(crate) fn register(&mut self, id: u64, callback: ChanCallback) {
        self.pending.entry(id).or_default().push(callback);
    }

    /// Consume the callbacks registered under `id`, if any.
    pub(crate) fn take(&mut self, id: u64) -> Option<Vec<ChanCallback>> {
        self.pending.remove(&id)
    }

    /// Abandon everything in flight. Returns how many entries were
    /// dropped, for the log line.
    pub(crate) fn clear(&mut self) -> usize {
        let abandoned = self.pending.len();
        self.pending.clear();
        abandoned
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
