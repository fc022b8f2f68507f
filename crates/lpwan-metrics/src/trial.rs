//! Repeated, isolated trials.

use anyhow::{Context, Result};
use lpwan_abstract::{ConfigError, EventSink, ExperimentConfig, SimTime};
use tracing::{info, warn};

use crate::aggregate::aggregate;
use crate::energy::PeriodicTask;
use crate::report::{ExperimentReport, TrialBatteryLog, TrialResult};
use crate::state::TrialState;

/// Derive a trial's random stream from the experiment seed.
/// Distinct stream indices give distinct, reproducible seeds.
pub fn stream_seed(seed: u64, stream_index: u64) -> u64 {
    // splitmix64 finalizer over the combined value
    let mut z = seed ^ stream_index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// What a simulation needs to know to run one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialContext {
    pub index: u32,
    /// Random-stream index, `index + 1`.
    pub stream_index: u64,
    pub seed: u64,
    pub stop_time: SimTime,
    /// Recurring tasks to arm at trial start; empty when the profile has no power trace.
    pub periodic: Vec<PeriodicTask>,
}

impl TrialContext {
    pub fn rng_seed(&self) -> u64 {
        stream_seed(self.seed, self.stream_index)
    }
}

/// A simulation that can replay a full trial into an [`EventSink`].
pub trait TrialSimulation {
    /// Run from time zero up to `ctx.stop_time`, emitting every event into `sink`.
    fn run_trial(&mut self, ctx: &TrialContext, sink: &mut dyn EventSink) -> Result<()>;
}

pub struct TrialDriver {
    config: ExperimentConfig,
    state: TrialState,
}

impl TrialDriver {
    pub fn new(config: ExperimentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.profile().tracks_outcomes && config.classification_window_is_empty() {
            warn!(
                "classification window ({} ms warm-up, {} ms cool-down) leaves nothing of a {} ms trial",
                config.warmup_ms, config.cooldown_ms, config.stop_time_ms
            );
        }
        let state = TrialState::new(&config);
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn state(&self) -> &TrialState {
        &self.state
    }

    pub fn context_for(&self, index: u32) -> TrialContext {
        let periodic = if self.config.profile().uses_power_trace() {
            self.state.sampler().tasks().to_vec()
        } else {
            Vec::new()
        };
        TrialContext {
            index,
            stream_index: u64::from(index) + 1,
            seed: self.config.seed,
            stop_time: self.config.stop_time_ms,
            periodic,
        }
    }

    /// Reset all per-trial state, run one trial and fold it into a result.
    pub fn run_trial(
        &mut self,
        index: u32,
        sim: &mut impl TrialSimulation,
    ) -> Result<(TrialResult, TrialBatteryLog)> {
        self.state.reset();
        debug_assert!(self.state.is_pristine());

        let ctx = self.context_for(index);
        info!(
            "trial {} starting ({} devices, {} m, stream {})",
            index + 1,
            self.config.device_count,
            self.config.distance_m,
            ctx.stream_index
        );
        sim.run_trial(&ctx, &mut self.state)
            .with_context(|| format!("trial {} failed", index + 1))?;

        let result = self.finish(index);
        info!(
            "trial {} done: sent {} received {} duplicated {} | PDR {:.2}% PLR {:.2}% delay {:.3} s",
            index + 1,
            result.sent,
            result.received,
            result.duplicated,
            result.pdr,
            result.plr,
            result.average_delay_s
        );
        let battery = TrialBatteryLog {
            trial_index: index,
            samples: self.state.sampler().log().to_vec(),
        };
        Ok((result, battery))
    }

    /// Run every configured trial in order.
    pub fn run(&mut self, sim: &mut impl TrialSimulation) -> Result<ExperimentReport> {
        let mut trials = Vec::with_capacity(self.config.trials as usize);
        let mut battery_logs = Vec::new();
        for index in 0..self.config.trials {
            let (result, battery) = self.run_trial(index, sim)?;
            trials.push(result);
            if !battery.samples.is_empty() {
                battery_logs.push(battery);
            }
        }
        let report = ExperimentReport::new(self.config.clone(), trials, battery_logs);
        info!(
            "{} trials of {}: PDR {:.2}% ± {:.2}, throughput {:.1} bps ± {:.1}",
            report.summary.trials,
            self.config.protocol,
            report.summary.pdr.mean,
            report.summary.pdr.std_dev,
            report.summary.throughput_bps.mean,
            report.summary.throughput_bps.std_dev
        );
        Ok(report)
    }

    fn finish(&self, index: u32) -> TrialResult {
        let counters = self.state.counters();
        let inputs = self.state.aggregation_inputs();
        let stats = aggregate(counters, &inputs);
        TrialResult {
            trial_index: index,
            protocol: self.config.protocol,
            distance_m: self.config.distance_m,
            device_count: self.config.device_count,
            sent: counters.sent,
            received: counters.received,
            duplicated: counters.duplicated,
            pdr: stats.pdr,
            plr: stats.plr,
            retransmission_rate: stats.retransmission_rate,
            throughput_bps: stats.throughput_bps,
            channel_utilization: stats.channel_utilization,
            average_delay_s: stats.average_delay_s,
            bandwidth_khz: self.state.profile().bandwidth_khz,
            energy_consumed_j: stats.energy_consumed_j,
            remaining_energy_j: inputs.remaining_energy_j,
            outcomes: self.state.outcomes().summarize(),
        }
    }
}
