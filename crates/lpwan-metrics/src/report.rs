//! Trial results and the artifacts derived from them.

use lpwan_abstract::{ExperimentConfig, ProtocolKind};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::aggregate::DerivedStats;
use crate::energy::BatterySample;
use crate::outcomes::OutcomeSummary;

/// Column order of the per-trial export.
pub const CSV_HEADER: &str = "trial,distance_m,devices,sent,received,duplicated,pdr_pct,plr_pct,\
retransmission_pct,throughput_bps,channel_utilization_pct,avg_delay_s,bandwidth_khz,energy_j";

/// Immutable snapshot of one finished trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    /// Zero-based position of the trial in the experiment.
    pub trial_index: u32,
    pub protocol: ProtocolKind,
    pub distance_m: f64,
    pub device_count: u32,
    pub sent: u64,
    pub received: u64,
    pub duplicated: u64,
    pub pdr: f64,
    pub plr: f64,
    pub retransmission_rate: f64,
    pub throughput_bps: f64,
    pub channel_utilization: f64,
    pub average_delay_s: f64,
    pub bandwidth_khz: f64,
    pub energy_consumed_j: f64,
    pub remaining_energy_j: f64,
    pub outcomes: OutcomeSummary,
}

impl TrialResult {
    pub fn derived(&self) -> DerivedStats {
        DerivedStats {
            pdr: self.pdr,
            plr: self.plr,
            retransmission_rate: self.retransmission_rate,
            throughput_bps: self.throughput_bps,
            channel_utilization: self.channel_utilization,
            average_delay_s: self.average_delay_s,
            energy_consumed_j: self.energy_consumed_j,
        }
    }

    /// One export row; the trial column is 1-based.
    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.trial_index + 1,
            self.distance_m,
            self.device_count,
            self.sent,
            self.received,
            self.duplicated,
            self.pdr,
            self.plr,
            self.retransmission_rate,
            self.throughput_bps,
            self.channel_utilization,
            self.average_delay_s,
            self.bandwidth_khz,
            self.energy_consumed_j,
        )
    }
}

pub fn write_csv<W: Write>(mut writer: W, results: &[TrialResult]) -> io::Result<()> {
    writeln!(writer, "{CSV_HEADER}")?;
    for result in results {
        writeln!(writer, "{}", result.csv_row())?;
    }
    writer.flush()
}

/// Battery samples recorded during one trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBatteryLog {
    pub trial_index: u32,
    pub samples: Vec<BatterySample>,
}

impl TrialBatteryLog {
    /// `trial,time_s,remaining_j` lines, trial 1-based.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for sample in &self.samples {
            writeln!(
                writer,
                "{},{},{}",
                self.trial_index + 1,
                sample.time_secs(),
                sample.remaining_j
            )?;
        }
        Ok(())
    }

    /// Append this trial's samples to the log file at `path`, creating it if needed.
    pub fn append_to_file(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = io::BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    /// Sample standard deviation; 0 for fewer than two trials.
    pub std_dev: f64,
}

impl MetricSummary {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = values.into_iter().collect();
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = if values.len() < 2 {
            0.0
        } else {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        };
        Self { mean, std_dev }
    }
}

/// Descriptive statistics across all trials of an experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperimentSummary {
    pub trials: usize,
    pub pdr: MetricSummary,
    pub plr: MetricSummary,
    pub retransmission_rate: MetricSummary,
    pub throughput_bps: MetricSummary,
    pub channel_utilization: MetricSummary,
    pub average_delay_s: MetricSummary,
    pub energy_consumed_j: MetricSummary,
}

impl ExperimentSummary {
    pub fn from_results(results: &[TrialResult]) -> Self {
        let over = |f: fn(&TrialResult) -> f64| MetricSummary::from_values(results.iter().map(f));
        Self {
            trials: results.len(),
            pdr: over(|r| r.pdr),
            plr: over(|r| r.plr),
            retransmission_rate: over(|r| r.retransmission_rate),
            throughput_bps: over(|r| r.throughput_bps),
            channel_utilization: over(|r| r.channel_utilization),
            average_delay_s: over(|r| r.average_delay_s),
            energy_consumed_j: over(|r| r.energy_consumed_j),
        }
    }
}

/// Everything an experiment produced; serialized as the JSON trace.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub config: ExperimentConfig,
    pub trials: Vec<TrialResult>,
    pub battery_logs: Vec<TrialBatteryLog>,
    pub summary: ExperimentSummary,
}

impl ExperimentReport {
    pub fn new(
        config: ExperimentConfig,
        trials: Vec<TrialResult>,
        battery_logs: Vec<TrialBatteryLog>,
    ) -> Self {
        let summary = ExperimentSummary::from_results(&trials);
        Self {
            config,
            trials,
            battery_logs,
            summary,
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> io::Result<()> {
        write_csv(writer, &self.trials)
    }

    pub fn append_battery_logs(&self, path: &Path) -> io::Result<()> {
        for log in &self.battery_logs {
            log.append_to_file(path)?;
        }
        Ok(())
    }
}
