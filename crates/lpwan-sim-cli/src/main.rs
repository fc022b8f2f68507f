use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use lpwan_abstract::{
    ChannelOverride, ExperimentConfig, ExperimentOverride, ExperimentScenario, ProtocolKind,
};
use lpwan_metrics::{ExperimentReport, TrialDriver};
use lpwan_simulator::{SimulationStats, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "LPWAN experiment runner")]
struct Args {
    /// Load an experiment scenario (TOML) from disk.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// lorawan, sigfox or nbiot. Overrides the scenario's protocol.
    #[arg(long)]
    protocol: Option<ProtocolKind>,

    #[arg(long)]
    devices: Option<u32>,

    /// Device-to-gateway distance in metres.
    #[arg(long)]
    distance: Option<f64>,

    /// Application payload in bytes.
    #[arg(long)]
    payload: Option<u32>,

    #[arg(long)]
    trials: Option<u32>,

    #[arg(long)]
    seed: Option<u64>,

    /// Trial length in milliseconds.
    #[arg(long)]
    stop_time: Option<u64>,

    #[arg(long)]
    loss_rate: Option<f64>,

    #[arg(long)]
    duplicate_rate: Option<f64>,

    /// Write per-trial results as CSV.
    #[arg(long)]
    csv_out: Option<PathBuf>,

    /// Write a JSON trace of the finished experiment.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Append battery samples of power-traced trials to this file.
    #[arg(long)]
    battery_log: Option<PathBuf>,
}

#[derive(Serialize)]
struct ExperimentTrace<'a> {
    report: &'a ExperimentReport,
    channel: &'a [SimulationStats],
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("lpwan-sim-cli starting…");

    let config = args.resolve_config()?;
    info!(
        "{}: {} devices at {} m, {} byte payload, {} trials, seed {}",
        config.protocol,
        config.device_count,
        config.distance_m,
        config.payload_bytes,
        config.trials,
        config.seed
    );

    let mut driver = TrialDriver::new(config.clone()).context("Invalid experiment configuration")?;
    let mut sim = Simulator::new(config);
    let report = driver.run(&mut sim)?;
    print_summary(&report);

    if let Some(path) = &args.csv_out {
        write_csv(path, &report)?;
    }
    if let Some(path) = &args.trace_out {
        write_trace(path, &report, sim.history())?;
    }
    if let Some(path) = &args.battery_log {
        report
            .append_battery_logs(path)
            .with_context(|| format!("Failed to append battery log to {}", path.display()))?;
    }

    Ok(())
}

impl Args {
    /// Defaults, then the protocol profile, then the scenario file, then flags.
    fn resolve_config(&self) -> Result<ExperimentConfig> {
        let scenario = match &self.scenario {
            Some(path) => load_scenario(path)?,
            None => ExperimentScenario::default(),
        };
        if let Some(name) = &scenario.name {
            info!("Loaded scenario '{}'", name);
        }
        let mut config = scenario.resolve(self.protocol);
        self.overrides().apply_to(&mut config);
        Ok(config)
    }

    fn overrides(&self) -> ExperimentOverride {
        let channel = (self.loss_rate.is_some() || self.duplicate_rate.is_some()).then(|| {
            ChannelOverride {
                loss_rate: self.loss_rate,
                duplicate_rate: self.duplicate_rate,
                ..Default::default()
            }
        });
        ExperimentOverride {
            device_count: self.devices,
            distance_m: self.distance,
            payload_bytes: self.payload,
            trials: self.trials,
            seed: self.seed,
            stop_time_ms: self.stop_time,
            channel,
            ..Default::default()
        }
    }
}

fn load_scenario(path: &Path) -> Result<ExperimentScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))
}

fn print_summary(report: &ExperimentReport) {
    let s = &report.summary;
    info!(
        "{} trials | PDR {:.2}% ± {:.2} | PLR {:.2}% ± {:.2} | retx {:.2}% ± {:.2}",
        s.trials,
        s.pdr.mean,
        s.pdr.std_dev,
        s.plr.mean,
        s.plr.std_dev,
        s.retransmission_rate.mean,
        s.retransmission_rate.std_dev
    );
    info!(
        "throughput {:.1} bps ± {:.1} | utilization {:.3}% ± {:.3} | delay {:.3} s ± {:.3} | energy {:.2} J ± {:.2}",
        s.throughput_bps.mean,
        s.throughput_bps.std_dev,
        s.channel_utilization.mean,
        s.channel_utilization.std_dev,
        s.average_delay_s.mean,
        s.average_delay_s.std_dev,
        s.energy_consumed_j.mean,
        s.energy_consumed_j.std_dev
    );
    if report.config.profile().tracks_outcomes {
        let (ok, failed) = report
            .trials
            .iter()
            .fold((0, 0), |(ok, failed), t| {
                (ok + t.outcomes.successes, failed + t.outcomes.failures)
            });
        info!("logical packets: {} succeeded, {} failed", ok, failed);
    }
}

fn write_csv(path: &Path, report: &ExperimentReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    report
        .write_csv(BufWriter::new(file))
        .with_context(|| format!("Failed to write CSV file {}", path.display()))?;
    info!("Wrote {} trial rows to {}", report.trials.len(), path.display());
    Ok(())
}

fn write_trace(path: &Path, report: &ExperimentReport, channel: &[SimulationStats]) -> Result<()> {
    let trace = ExperimentTrace { report, channel };
    let data = serde_json::to_vec_pretty(&trace).context("Failed to serialize experiment trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    info!("Experiment trace written to {}", path.display());
    Ok(())
}
