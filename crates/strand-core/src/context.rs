//! Stream context - mode flags carried out of band by the session layer
//!
//! A record never embeds its own mode in the byte stream. The session decides
//! whether a flush is a full snapshot or a delta, which channel it rides, and
//! which update id it belongs to.

use crate::UpdateId;

/// Which encode/decode path a record takes for one message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StreamContext {
    /// Every property, unconditionally (new observer / resync)
    pub full_model: bool,
    /// Message rides the ordered-reliable channel
    pub reliable_channel: bool,
    /// Incoming message is an echo of deltas only (decode side)
    pub delta_updates_only: bool,
    /// Update id for reliable deltas
    pub update_id: UpdateId,
}

impl StreamContext {
    /// Full snapshot for a joining peer
    pub fn full_snapshot() -> Self {
        StreamContext {
            full_model: true,
            reliable_channel: true,
            delta_updates_only: false,
            update_id: UpdateId::ZERO,
        }
    }

    /// Outgoing reliable delta under `update_id`
    pub fn reliable_delta(update_id: UpdateId) -> Self {
        StreamContext {
            full_model: false,
            reliable_channel: true,
            delta_updates_only: false,
            update_id,
        }
    }

    /// Incoming reliable delta confirming `update_id` was consumed
    pub fn reliable_echo(update_id: UpdateId) -> Self {
        StreamContext {
            full_model: false,
            reliable_channel: true,
            delta_updates_only: true,
            update_id,
        }
    }

    /// Unreliable delta (no update id, never tracked)
    pub fn unreliable_delta() -> Self {
        StreamContext {
            full_model: false,
            reliable_channel: false,
            delta_updates_only: false,
            update_id: UpdateId::ZERO,
        }
    }

    /// Decoding this message retires `update_id` from the ledger
    #[inline]
    pub fn retires_update(&self) -> bool {
        self.delta_updates_only && self.reliable_channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_echo_retires() {
        let id = UpdateId::new(7);
        assert!(StreamContext::reliable_echo(id).retires_update());
        assert!(!StreamContext::reliable_delta(id).retires_update());
        assert!(!StreamContext::full_snapshot().retires_update());
        assert!(!StreamContext::unreliable_delta().retires_update());
    }
}
