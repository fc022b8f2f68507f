use crate::config::ExperimentConfig;
use crate::event::SimTime;
use crate::protocol::ProtocolKind;
use serde::Deserialize;

/// An experiment described in a TOML file.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ExperimentScenario {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub config: ExperimentOverride,
}

impl ExperimentScenario {
    /// Build the effective configuration: protocol baseline, then this scenario's overrides.
    /// `protocol` takes precedence over the scenario's own protocol when given.
    pub fn resolve(&self, protocol: Option<ProtocolKind>) -> ExperimentConfig {
        let kind = protocol.or(self.config.protocol).unwrap_or_default();
        let mut config = ExperimentConfig::for_protocol(kind);
        self.config.apply_to(&mut config);
        config.protocol = kind;
        config
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ExperimentOverride {
    pub protocol: Option<ProtocolKind>,
    pub device_count: Option<u32>,
    pub distance_m: Option<f64>,
    pub payload_bytes: Option<u32>,
    pub trials: Option<u32>,
    pub seed: Option<u64>,
    pub stop_time_ms: Option<SimTime>,
    pub first_send_ms: Option<SimTime>,
    pub stagger_ms: Option<SimTime>,
    pub send_period_ms: Option<SimTime>,
    pub repetition_gap_ms: Option<SimTime>,
    pub warmup_ms: Option<SimTime>,
    pub cooldown_ms: Option<SimTime>,
    pub channel: Option<ChannelOverride>,
    pub energy: Option<EnergyOverride>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ChannelOverride {
    pub loss_rate: Option<f64>,
    pub duplicate_rate: Option<f64>,
    pub min_latency_ms: Option<u64>,
    pub max_latency_ms: Option<u64>,
    pub path_loss_exponent: Option<f64>,
    pub reference_loss_db: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub sensitivity_dbm: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct EnergyOverride {
    pub battery_j: Option<f64>,
    pub device_initial_j: Option<f64>,
    pub tx_draw_j: Option<f64>,
    pub measurement_cost_j: Option<f64>,
    pub sampler_period_ms: Option<SimTime>,
}

macro_rules! apply_fields {
    ($src:expr, $dst:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $src.$field {
                $dst.$field = v;
            }
        )+
    };
}

impl ExperimentOverride {
    pub fn apply_to(&self, config: &mut ExperimentConfig) {
        apply_fields!(
            self,
            config,
            device_count,
            distance_m,
            payload_bytes,
            trials,
            seed,
            stop_time_ms,
            first_send_ms,
            stagger_ms,
            send_period_ms,
            repetition_gap_ms,
            warmup_ms,
            cooldown_ms,
        );
        if let Some(channel) = &self.channel {
            apply_fields!(
                channel,
                config.channel,
                loss_rate,
                duplicate_rate,
                min_latency_ms,
                max_latency_ms,
                path_loss_exponent,
                reference_loss_db,
                tx_power_dbm,
                sensitivity_dbm,
            );
        }
        if let Some(energy) = &self.energy {
            apply_fields!(
                energy,
                config.energy,
                battery_j,
                device_initial_j,
                tx_draw_j,
                measurement_cost_j,
                sampler_period_ms,
            );
        }
    }
}
