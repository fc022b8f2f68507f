use lpwan_abstract::{PacketId, SimTime};
use std::collections::HashMap;

/// Send timestamps of packets still in flight, each consumed by at most one receive.
#[derive(Debug, Default, Clone)]
pub struct SendLedger {
    sent_at: HashMap<PacketId, SimTime>,
}

impl SendLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the send time of `id`. A stale entry for the same id is overwritten.
    pub fn record_send(&mut self, id: PacketId, at: SimTime) {
        self.sent_at.insert(id, at);
    }

    /// Remove the entry for `id` and return the elapsed time since it was sent.
    /// `None` when the packet was never recorded (or was already resolved).
    pub fn resolve_receive(&mut self, id: PacketId, now: SimTime) -> Option<SimTime> {
        self.sent_at
            .remove(&id)
            .map(|sent| now.saturating_sub(sent))
    }

    pub fn in_flight(&self) -> usize {
        self.sent_at.len()
    }

    pub fn clear(&mut self) {
        self.sent_at.clear();
    }
}
