use lpwan_abstract::{
    EnergyModel, EventSink, ExperimentConfig, OriginatorId, PacketId, ProtocolProfile, SamplerTask,
    SimTime, UtilizationModel,
};
use tracing::debug;

use crate::aggregate::{AggregationInputs, Counters};
use crate::energy::EnergySampler;
use crate::ledger::SendLedger;
use crate::outcomes::{ClassificationWindow, OutcomeMatrix, RecordOutcome};
use crate::registry::{IdentityRegistry, Observation};

/// Every piece of mutable per-trial bookkeeping, owned by one trial at a time.
///
/// The simulation only reaches it through [`EventSink`]; the driver resets it
/// between trials and reads it once at the end.
#[derive(Debug, Clone)]
pub struct TrialState {
    now: SimTime,
    device_count: usize,
    payload_bytes: u32,
    profile: ProtocolProfile,
    window: ClassificationWindow,
    counters: Counters,
    registry: IdentityRegistry,
    ledger: SendLedger,
    outcomes: OutcomeMatrix,
    sampler: EnergySampler,
}

impl TrialState {
    pub fn new(config: &ExperimentConfig) -> Self {
        let device_count = config.device_count as usize;
        Self {
            now: 0,
            device_count,
            payload_bytes: config.payload_bytes,
            profile: config.profile(),
            window: ClassificationWindow::new(
                config.warmup_ms,
                config.stop_time_ms,
                config.cooldown_ms,
            ),
            counters: Counters::default(),
            registry: IdentityRegistry::new(),
            ledger: SendLedger::new(),
            outcomes: OutcomeMatrix::new(device_count),
            sampler: EnergySampler::new(
                config.energy.battery_j,
                config.energy.measurement_cost_j,
                config.energy.sampler_period_ms,
            ),
        }
    }

    /// Return to the freshly constructed state.
    pub fn reset(&mut self) {
        self.now = 0;
        self.counters = Counters::default();
        self.registry.clear();
        self.ledger.clear();
        self.outcomes.reset(self.device_count);
        self.sampler.reset();
    }

    /// True when nothing has been recorded since construction or the last reset.
    pub fn is_pristine(&self) -> bool {
        self.now == 0
            && self.counters.is_zero()
            && self.registry.is_empty()
            && self.ledger.in_flight() == 0
            && self.outcomes.classified() == 0
            && self.sampler.log().is_empty()
            && self.sampler.measurement_energy() == 0.0
            && self.sampler.node_energy() == 0.0
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn outcomes(&self) -> &OutcomeMatrix {
        &self.outcomes
    }

    pub fn sampler(&self) -> &EnergySampler {
        &self.sampler
    }

    pub fn ledger(&self) -> &SendLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn profile(&self) -> &ProtocolProfile {
        &self.profile
    }

    pub fn window(&self) -> &ClassificationWindow {
        &self.window
    }

    pub fn aggregation_inputs(&self) -> AggregationInputs {
        AggregationInputs {
            observation_window_ms: self.window.trial_end,
            payload_bytes: self.payload_bytes,
            bandwidth_hz: self.profile.bandwidth_hz(),
            utilization: self.profile.utilization,
            energy: self.profile.energy,
            battery_j: self.sampler.battery_j(),
            remaining_energy_j: self.sampler.remaining_energy(),
        }
    }
}

impl EventSink for TrialState {
    fn advance_clock(&mut self, now: SimTime) {
        debug_assert!(now >= self.now, "events must arrive in time order");
        self.now = now;
    }

    fn on_send(&mut self, packet: PacketId, originator: OriginatorId) {
        self.counters.sent += 1;
        self.ledger.record_send(packet, self.now);

        if let UtilizationModel::OccupiedTime { seconds_per_send } = self.profile.utilization {
            self.counters.transmit_occupied_s += seconds_per_send;
        }
        if let EnergyModel::PerTransmission { joules_per_send } = self.profile.energy {
            self.counters.transmission_energy_j += joules_per_send;
        }
        debug!("{} sent packet {} at {} ms", originator, packet, self.now);
    }

    fn on_receive(&mut self, packet: PacketId, byte_size: u32) -> bool {
        match self.registry.observe(packet) {
            Observation::Duplicate => {
                self.counters.duplicated += 1;
                debug!("duplicate delivery of packet {}", packet);
                false
            }
            Observation::FirstSeen => {
                self.counters.received += 1;
                self.counters.bytes_received += u64::from(byte_size);
                match self.ledger.resolve_receive(packet, self.now) {
                    Some(delay) => {
                        self.counters.cumulative_delay_ms += delay;
                        self.counters.delay_samples += 1;
                    }
                    None => debug!("packet {} received without a send record", packet),
                }
                true
            }
        }
    }

    fn on_outcome(&mut self, originator: OriginatorId, logical_seq: u32, attempt: u32, succeeded: bool) {
        let recorded = self.outcomes.record_outcome(
            originator,
            logical_seq,
            attempt,
            succeeded,
            self.now,
            &self.window,
        );
        if recorded != RecordOutcome::Excluded {
            debug!(
                "{} packet {} attempt {}: {}",
                originator,
                logical_seq,
                attempt,
                if succeeded { "decoded" } else { "lost" }
            );
        }
    }

    fn on_energy_update(&mut self, old_value: f64, new_value: f64) {
        self.sampler.on_energy_update(old_value, new_value);
    }

    fn on_sampler_tick(&mut self, task: SamplerTask) {
        self.sampler.fire(task, self.now);
    }
}
