pub mod channel;
pub mod engine;
pub mod trace;

pub use channel::{Channel, Transmission};
pub use engine::Simulator;
pub use trace::SimulationStats;
