//! Periodic energy bookkeeping.
//!
//! Two recurring tasks run on the scheduler: `Measure` charges the gateway's
//! own operating overhead and `Report` derives the remaining battery and
//! appends it to the battery log. Device power sources push their latest
//! value through [`EnergySampler::on_energy_update`].

use lpwan_abstract::{SamplerTask, SimTime, millis_to_secs};
use serde::Serialize;
use tracing::debug;

/// A self-rearming task: first fires at `first_due`, then every `period`
/// until the next firing would fall past the stop time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodicTask {
    pub task: SamplerTask,
    pub first_due: SimTime,
    pub period: SimTime,
}

impl PeriodicTask {
    pub fn new(task: SamplerTask, period: SimTime) -> Self {
        Self {
            task,
            first_due: period,
            period,
        }
    }

    /// When to re-arm after firing at `now`, or `None` once past `stop`.
    pub fn next_due(&self, now: SimTime, stop: SimTime) -> Option<SimTime> {
        let next = now.checked_add(self.period)?;
        (self.period > 0 && next <= stop).then_some(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatterySample {
    pub time_ms: SimTime,
    pub remaining_j: f64,
}

impl BatterySample {
    pub fn time_secs(&self) -> f64 {
        millis_to_secs(self.time_ms)
    }
}

#[derive(Debug, Clone)]
pub struct EnergySampler {
    battery_j: f64,
    measurement_cost_j: f64,
    period: SimTime,
    measurement_energy_j: f64,
    node_energy_j: f64,
    remaining_j: f64,
    depleted: bool,
    log: Vec<BatterySample>,
}

impl EnergySampler {
    pub fn new(battery_j: f64, measurement_cost_j: f64, period: SimTime) -> Self {
        Self {
            battery_j,
            measurement_cost_j,
            period,
            measurement_energy_j: 0.0,
            node_energy_j: 0.0,
            remaining_j: battery_j,
            depleted: false,
            log: Vec::new(),
        }
    }

    /// The tasks the scheduler should arm at trial start, in firing order
    /// for ticks sharing a timestamp.
    pub fn tasks(&self) -> [PeriodicTask; 2] {
        [
            PeriodicTask::new(SamplerTask::Report, self.period),
            PeriodicTask::new(SamplerTask::Measure, self.period),
        ]
    }

    /// Last writer wins: the value reflects the device's latest report, not a sum.
    pub fn on_energy_update(&mut self, _old: f64, new: f64) {
        self.node_energy_j = new;
    }

    pub fn fire(&mut self, task: SamplerTask, now: SimTime) {
        match task {
            SamplerTask::Measure => {
                self.measurement_energy_j += self.measurement_cost_j;
                debug!(
                    "measure tick at {} ms, measurement energy {:.1} J",
                    now, self.measurement_energy_j
                );
            }
            SamplerTask::Report => {
                let sample = self.report(now);
                debug!(
                    "battery at {:.0} s: {:.1} J remaining",
                    sample.time_secs(),
                    sample.remaining_j
                );
            }
        }
    }

    fn report(&mut self, now: SimTime) -> BatterySample {
        if !self.depleted {
            self.remaining_j = self.battery_j - self.node_energy_j - self.measurement_energy_j;
        }
        if self.remaining_j <= 0.0 {
            self.remaining_j = 0.0;
            self.depleted = true;
        }
        let sample = BatterySample {
            time_ms: now,
            remaining_j: self.remaining_j,
        };
        self.log.push(sample);
        sample
    }

    pub fn battery_j(&self) -> f64 {
        self.battery_j
    }

    /// Remaining energy as of the last report; the full battery before any report.
    pub fn remaining_energy(&self) -> f64 {
        self.remaining_j
    }

    pub fn measurement_energy(&self) -> f64 {
        self.measurement_energy_j
    }

    pub fn node_energy(&self) -> f64 {
        self.node_energy_j
    }

    pub fn is_depleted(&self) -> bool {
        self.depleted
    }

    pub fn log(&self) -> &[BatterySample] {
        &self.log
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.battery_j, self.measurement_cost_j, self.period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_subtracts_node_and_measurement_energy() {
        let mut sampler = EnergySampler::new(1000.0, 32.2, 60_000);
        sampler.on_energy_update(0.0, 100.0);
        sampler.fire(SamplerTask::Measure, 60_000);
        sampler.fire(SamplerTask::Report, 60_000);
        assert!((sampler.remaining_energy() - 867.8).abs() < 1e-9);
        assert_eq!(sampler.log().len(), 1);
        assert_eq!(sampler.log()[0].time_ms, 60_000);
    }

    #[test]
    fn node_energy_is_last_writer_wins() {
        let mut sampler = EnergySampler::new(1000.0, 0.0, 60_000);
        sampler.on_energy_update(0.0, 50.0);
        sampler.on_energy_update(50.0, 20.0);
        assert_eq!(sampler.node_energy(), 20.0);
        sampler.fire(SamplerTask::Report, 60_000);
        assert_eq!(sampler.remaining_energy(), 980.0);
    }

    #[test]
    fn remaining_stays_at_zero_once_depleted() {
        let mut sampler = EnergySampler::new(100.0, 60.0, 60_000);
        sampler.fire(SamplerTask::Measure, 60_000);
        sampler.fire(SamplerTask::Measure, 120_000);
        sampler.fire(SamplerTask::Report, 120_000);
        assert_eq!(sampler.remaining_energy(), 0.0);
        assert!(sampler.is_depleted());

        // a lower node reading would otherwise lift the remaining energy back up
        sampler.on_energy_update(0.0, -500.0);
        sampler.fire(SamplerTask::Report, 180_000);
        assert_eq!(sampler.remaining_energy(), 0.0);
        assert!(sampler.log().iter().skip(1).all(|s| s.remaining_j == 0.0));
    }

    #[test]
    fn remaining_is_full_battery_before_first_report() {
        let sampler = EnergySampler::new(360_000.0, 32.2, 60_000);
        assert_eq!(sampler.remaining_energy(), 360_000.0);
        assert!(sampler.log().is_empty());
    }

    #[test]
    fn periodic_task_rearms_until_stop() {
        let task = PeriodicTask::new(SamplerTask::Report, 60_000);
        assert_eq!(task.first_due, 60_000);
        assert_eq!(task.next_due(60_000, 180_000), Some(120_000));
        assert_eq!(task.next_due(120_000, 180_000), Some(180_000));
        assert_eq!(task.next_due(180_000, 180_000), None);
    }

    #[test]
    fn reset_zeroes_accumulators() {
        let mut sampler = EnergySampler::new(500.0, 10.0, 1_000);
        sampler.on_energy_update(0.0, 42.0);
        sampler.fire(SamplerTask::Measure, 1_000);
        sampler.fire(SamplerTask::Report, 1_000);
        sampler.reset();
        assert_eq!(sampler.measurement_energy(), 0.0);
        assert_eq!(sampler.node_energy(), 0.0);
        assert_eq!(sampler.remaining_energy(), 500.0);
        assert!(sampler.log().is_empty());
    }
}
