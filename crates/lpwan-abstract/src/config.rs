use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::SimTime;
use crate::protocol::{ProtocolKind, ProtocolProfile};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("an experiment needs at least one trial")]
    ZeroTrials,
    #[error("distance must be a non-negative finite number of metres, got {0}")]
    InvalidDistance(f64),
    #[error("stop time must be greater than zero")]
    ZeroStopTime,
    #[error("send period must be greater than zero")]
    ZeroSendPeriod,
    #[error("sampler period must be greater than zero")]
    ZeroSamplerPeriod,
    #[error("payload size must be greater than zero")]
    ZeroPayload,
    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("latency range is inverted: min {min} ms > max {max} ms")]
    InvertedLatency { min: u64, max: u64 },
    #[error("{name} must be a non-negative finite number, got {value}")]
    InvalidEnergy { name: &'static str, value: f64 },
    #[error("unknown protocol '{0}', try lorawan, sigfox or nbiot")]
    UnknownProtocol(String),
}

/// Lossy radio channel between the devices and the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    /// Probability that a transmission above the sensitivity threshold is lost anyway.
    pub loss_rate: f64,
    /// Probability that a delivered packet is delivered a second time.
    pub duplicate_rate: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub path_loss_exponent: f64,
    /// Path loss at the 1 m reference distance.
    pub reference_loss_db: f64,
    pub tx_power_dbm: f64,
    pub sensitivity_dbm: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.1,
            duplicate_rate: 0.05,
            min_latency_ms: 10,
            max_latency_ms: 100,
            path_loss_exponent: 4.0,
            reference_loss_db: 10.0,
            tx_power_dbm: 14.0,
            sensitivity_dbm: -137.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnergyConfig {
    /// Capacity the remaining-energy trace is derived from.
    pub battery_j: f64,
    /// Initial energy of each device's power source.
    pub device_initial_j: f64,
    /// Radio energy a device draws from its power source per transmission.
    pub tx_draw_j: f64,
    /// Overhead charged by the measurement task on every tick.
    pub measurement_cost_j: f64,
    pub sampler_period_ms: SimTime,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            battery_j: 100.0 * 60.0 * 60.0,
            device_initial_j: 3600.0,
            tx_draw_j: 0.1,
            measurement_cost_j: 32.2,
            sampler_period_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentConfig {
    pub protocol: ProtocolKind,
    pub device_count: u32,
    pub distance_m: f64,
    pub payload_bytes: u32,
    pub trials: u32,
    pub seed: u64,
    /// Simulated stop time; also the observation window for rates.
    pub stop_time_ms: SimTime,
    /// Time of the first application packet of device 0.
    pub first_send_ms: SimTime,
    /// Offset between the first packets of consecutive devices.
    pub stagger_ms: SimTime,
    pub send_period_ms: SimTime,
    /// Spacing between redundant attempts of one logical packet.
    pub repetition_gap_ms: SimTime,
    pub warmup_ms: SimTime,
    pub cooldown_ms: SimTime,
    pub channel: ChannelConfig,
    pub energy: EnergyConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self::for_protocol(ProtocolKind::default())
    }
}

impl ExperimentConfig {
    /// Baseline experiment for a protocol.
    pub fn for_protocol(protocol: ProtocolKind) -> Self {
        let profile = protocol.profile();
        let base = Self {
            protocol,
            device_count: 10,
            distance_m: 1000.0,
            payload_bytes: profile.default_payload_bytes,
            trials: 1,
            seed: 12345,
            stop_time_ms: 15_000,
            first_send_ms: 1_000,
            stagger_ms: 1_000,
            send_period_ms: 15_000,
            repetition_gap_ms: 0,
            warmup_ms: 0,
            cooldown_ms: 0,
            channel: ChannelConfig::default(),
            energy: EnergyConfig::default(),
        };

        match protocol {
            ProtocolKind::LoRaWan => base,
            ProtocolKind::Sigfox => Self {
                stop_time_ms: 600_000,
                first_send_ms: 0,
                send_period_ms: 60_000,
                repetition_gap_ms: 2_000,
                warmup_ms: 10_000,
                cooldown_ms: 10_000,
                channel: ChannelConfig {
                    path_loss_exponent: 3.76,
                    reference_loss_db: 7.7,
                    sensitivity_dbm: -142.0,
                    ..ChannelConfig::default()
                },
                ..base
            },
            ProtocolKind::NbIot => Self {
                stop_time_ms: 10_000,
                first_send_ms: 2_000,
                stagger_ms: 0,
                send_period_ms: 500,
                channel: ChannelConfig {
                    path_loss_exponent: 3.5,
                    sensitivity_dbm: -130.0,
                    ..ChannelConfig::default()
                },
                energy: EnergyConfig {
                    tx_draw_j: 0.05,
                    ..EnergyConfig::default()
                },
                ..base
            },
        }
    }

    pub fn profile(&self) -> ProtocolProfile {
        self.protocol.profile()
    }

    /// Reject configurations the engine cannot run. Called before any trial starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials == 0 {
            return Err(ConfigError::ZeroTrials);
        }
        if !self.distance_m.is_finite() || self.distance_m < 0.0 {
            return Err(ConfigError::InvalidDistance(self.distance_m));
        }
        if self.stop_time_ms == 0 {
            return Err(ConfigError::ZeroStopTime);
        }
        if self.send_period_ms == 0 {
            return Err(ConfigError::ZeroSendPeriod);
        }
        if self.energy.sampler_period_ms == 0 {
            return Err(ConfigError::ZeroSamplerPeriod);
        }
        if self.payload_bytes == 0 {
            return Err(ConfigError::ZeroPayload);
        }
        check_probability("loss_rate", self.channel.loss_rate)?;
        check_probability("duplicate_rate", self.channel.duplicate_rate)?;
        if self.channel.min_latency_ms > self.channel.max_latency_ms {
            return Err(ConfigError::InvertedLatency {
                min: self.channel.min_latency_ms,
                max: self.channel.max_latency_ms,
            });
        }
        check_energy("battery_j", self.energy.battery_j)?;
        check_energy("device_initial_j", self.energy.device_initial_j)?;
        check_energy("tx_draw_j", self.energy.tx_draw_j)?;
        check_energy("measurement_cost_j", self.energy.measurement_cost_j)?;
        Ok(())
    }

    /// True when no outcome could ever fall strictly inside the classification window.
    pub fn classification_window_is_empty(&self) -> bool {
        self.warmup_ms.saturating_add(self.cooldown_ms) >= self.stop_time_ms
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}

fn check_energy(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnergy { name, value })
    }
}
