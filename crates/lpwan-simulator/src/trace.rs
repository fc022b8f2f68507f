use serde::Serialize;

/// Channel-side counts of the last trial, independent of the metrics engine's view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    pub events_processed: u64,
    pub logical_packets: u64,
    pub transmissions: u64,
    pub out_of_range: u64,
    pub channel_losses: u64,
    pub redeliveries: u64,
    pub sampler_ticks: u64,
    /// Events still queued past the stop time when the trial ended.
    pub discarded_at_stop: u64,
}
