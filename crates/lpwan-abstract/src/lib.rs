pub mod config;
pub mod event;
pub mod interface;
pub mod protocol;
pub mod scenario;

pub use config::{ChannelConfig, ConfigError, EnergyConfig, ExperimentConfig};
pub use event::{OriginatorId, PacketId, SamplerTask, SimTime, millis_to_secs};
pub use interface::EventSink;
pub use protocol::{EnergyModel, ProtocolKind, ProtocolProfile, UtilizationModel};
pub use scenario::{ChannelOverride, EnergyOverride, ExperimentOverride, ExperimentScenario};
