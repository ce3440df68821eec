//! Routes decoded inbound frames to the registry or the correlator.

use crate::client::correlator::RequestCorrelator;
use crate::client::registry::SubscriptionRegistry;
use crate::protocol::InboundFrame;

use log::warn;

/// Route one decoded frame.
///
/// Pure routing over the two in-memory tables, no blocking: pushes fan
/// out to the channel's callbacks in registration order; responses
/// consume their pending entry, so delivery per request id is
/// at-most-once; everything else is logged and dropped. Unroutable
/// frames never surface an error to callers.
pub(crate) fn dispatch(
    frame: InboundFrame,
    registry: &mut SubscriptionRegistry,
    correlator: &mut RequestCorrelator,
) {
    match frame {
        InboundFrame::Push { channel, data } => {
            let delivered = registry.deliver(&channel, &data);
            if delivered == 0 {
                warn!("Push for channel '{channel}' has no subscribers, dropping");
            }
        }
        InboundFrame::Response { id, result } => match correlator.take(id) {
            Some(mut callbacks) => {
                for callback in callbacks.iter_mut() {
                    callback(result.clone());
                }
            }
            None => warn!("Response for unknown request id {id}, dropping"),
        },
        InboundFrame::Unroutable { id, method } => {
            warn!("Unroutable frame (id: {id:?}, method: {method:?}), dropping");
        }
    }
}
