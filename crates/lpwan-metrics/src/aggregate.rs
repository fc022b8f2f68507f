use lpwan_abstract::{EnergyModel, SimTime, UtilizationModel, millis_to_secs};
use serde::Serialize;

/// Raw per-trial counters and sums, mutated only by event ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Counters {
    pub sent: u64,
    pub received: u64,
    pub duplicated: u64,
    /// Sum of send-to-receive latencies of correlated receptions.
    pub cumulative_delay_ms: SimTime,
    /// Number of receptions that contributed a latency sample.
    pub delay_samples: u64,
    pub bytes_received: u64,
    pub transmit_occupied_s: f64,
    pub transmission_energy_j: f64,
}

impl Counters {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Trial parameters the derived statistics depend on.
#[derive(Debug, Clone, Copy)]
pub struct AggregationInputs {
    pub observation_window_ms: SimTime,
    pub payload_bytes: u32,
    pub bandwidth_hz: f64,
    pub utilization: UtilizationModel,
    pub energy: EnergyModel,
    pub battery_j: f64,
    pub remaining_energy_j: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedStats {
    pub pdr: f64,
    pub plr: f64,
    pub retransmission_rate: f64,
    pub throughput_bps: f64,
    pub channel_utilization: f64,
    pub average_delay_s: f64,
    pub energy_consumed_j: f64,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Fold final counters into derived statistics. Zero denominators yield 0.
pub fn aggregate(counters: &Counters, inputs: &AggregationInputs) -> DerivedStats {
    let sent = counters.sent as f64;
    let received = counters.received as f64;
    let window_s = millis_to_secs(inputs.observation_window_ms);

    let channel_utilization = match inputs.utilization {
        UtilizationModel::OccupiedTime { .. } => {
            ratio(counters.transmit_occupied_s, window_s) * 100.0
        }
        UtilizationModel::PayloadBits => {
            let bits = sent * f64::from(inputs.payload_bytes) * 8.0;
            ratio(bits, window_s * inputs.bandwidth_hz) * 100.0
        }
    };

    let energy_consumed_j = match inputs.energy {
        EnergyModel::PerTransmission { .. } => counters.transmission_energy_j,
        EnergyModel::PowerSourceTrace => inputs.battery_j - inputs.remaining_energy_j,
    };

    DerivedStats {
        pdr: ratio(received, sent) * 100.0,
        plr: ratio(sent - received, sent) * 100.0,
        retransmission_rate: ratio(counters.duplicated as f64, received) * 100.0,
        throughput_bps: ratio(counters.bytes_received as f64 * 8.0, window_s),
        channel_utilization,
        average_delay_s: ratio(millis_to_secs(counters.cumulative_delay_ms), received),
        energy_consumed_j,
    }
}
