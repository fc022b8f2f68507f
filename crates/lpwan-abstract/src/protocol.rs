use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// The radio technologies an experiment can be accounted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    #[default]
    LoRaWan,
    Sigfox,
    NbIot,
}

impl ProtocolKind {
    pub fn profile(self) -> ProtocolProfile {
        match self {
            ProtocolKind::LoRaWan => ProtocolProfile {
                kind: self,
                attempts_per_packet: 1,
                bandwidth_khz: 125.0,
                default_payload_bytes: 50,
                utilization: UtilizationModel::OccupiedTime {
                    seconds_per_send: 1.0,
                },
                energy: EnergyModel::PerTransmission {
                    joules_per_send: 0.1,
                },
                tracks_outcomes: false,
            },
            ProtocolKind::Sigfox => ProtocolProfile {
                kind: self,
                attempts_per_packet: 3,
                bandwidth_khz: 100.0,
                default_payload_bytes: 12,
                utilization: UtilizationModel::PayloadBits,
                energy: EnergyModel::PowerSourceTrace,
                tracks_outcomes: true,
            },
            ProtocolKind::NbIot => ProtocolProfile {
                kind: self,
                attempts_per_packet: 1,
                bandwidth_khz: 180.0,
                default_payload_bytes: 50,
                utilization: UtilizationModel::PayloadBits,
                energy: EnergyModel::PerTransmission {
                    joules_per_send: 0.05,
                },
                tracks_outcomes: false,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProtocolKind::LoRaWan => "lorawan",
            ProtocolKind::Sigfox => "sigfox",
            ProtocolKind::NbIot => "nbiot",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lorawan" | "lora" => Ok(ProtocolKind::LoRaWan),
            "sigfox" => Ok(ProtocolKind::Sigfox),
            "nbiot" | "nb-iot" => Ok(ProtocolKind::NbIot),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

/// How channel utilization is derived at the end of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UtilizationModel {
    /// Every send occupies the channel for a fixed amount of time.
    OccupiedTime { seconds_per_send: f64 },
    /// `sent * payload_bits / (window * bandwidth_hz)`.
    PayloadBits,
}

/// How consumed energy is derived at the end of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnergyModel {
    /// Fixed cost charged for every transmission.
    PerTransmission { joules_per_send: f64 },
    /// Battery capacity minus the remaining energy reported by the periodic sampler.
    PowerSourceTrace,
}

/// Accounting preset for a protocol. These select formulas and constants,
/// they do not model the protocol itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtocolProfile {
    pub kind: ProtocolKind,
    /// Redundant over-the-air copies sent for each logical packet.
    pub attempts_per_packet: u32,
    pub bandwidth_khz: f64,
    pub default_payload_bytes: u32,
    pub utilization: UtilizationModel,
    pub energy: EnergyModel,
    /// Whether gateway-side per-attempt outcomes are classified.
    pub tracks_outcomes: bool,
}

impl ProtocolProfile {
    pub fn bandwidth_hz(&self) -> f64 {
        self.bandwidth_khz * 1000.0
    }

    pub fn uses_power_trace(&self) -> bool {
        matches!(self.energy, EnergyModel::PowerSourceTrace)
    }
}
