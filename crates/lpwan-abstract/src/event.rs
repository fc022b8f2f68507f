use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulated time in milliseconds since the start of a trial.
pub type SimTime = u64;

const MILLIS_PER_SECOND: f64 = 1000.0;

pub fn millis_to_secs(ms: SimTime) -> f64 {
    ms as f64 / MILLIS_PER_SECOND
}

/// Identity of one packet instance, assigned by the simulation engine.
///
/// Unique for the lifetime of a trial while the packet is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PacketId(pub u64);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The device that originated a logical application packet (0..device_count).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OriginatorId(pub u32);

impl OriginatorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OriginatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// The recurring energy-bookkeeping tasks driven by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplerTask {
    /// Charge the fixed per-tick measurement overhead.
    Measure,
    /// Derive remaining battery and append a sample to the battery log.
    Report,
}
