//! Experiment metrics and outcome tracking for LPWAN simulations.
//!
//! The simulation pushes send/receive/outcome/energy events into a
//! [`TrialState`]; at the end of each trial the [`TrialDriver`] folds the
//! state into a [`TrialResult`] and resets everything before the next trial.

pub mod aggregate;
pub mod energy;
pub mod ledger;
pub mod outcomes;
pub mod registry;
pub mod report;
pub mod state;
pub mod trial;

pub use aggregate::{AggregationInputs, Counters, DerivedStats, aggregate};
pub use energy::{BatterySample, EnergySampler, PeriodicTask};
pub use ledger::SendLedger;
pub use outcomes::{ClassificationWindow, OutcomeMatrix, OutcomeSummary, RecordOutcome};
pub use registry::{IdentityRegistry, Observation};
pub use report::{
    CSV_HEADER, ExperimentReport, ExperimentSummary, MetricSummary, TrialBatteryLog, TrialResult,
    write_csv,
};
pub use state::TrialState;
pub use trial::{TrialContext, TrialDriver, TrialSimulation, stream_seed};
