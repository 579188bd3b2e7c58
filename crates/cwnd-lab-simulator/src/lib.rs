pub mod controller;
pub mod engine;
pub mod oracle;
pub mod scenario_runner;
pub mod trace;
pub mod transmitter;

#[cfg(feature = "tui")]
pub mod tui;

pub use controller::{CongestionController, ControllerState, Phase};
pub use engine::{Simulator, run};
pub use oracle::{LossOracle, RandomLoss, ScriptedLoss};
pub use trace::{SimulationReport, ThroughputAccumulator, TraceSample};
pub use transmitter::{StepOutcome, segment_count, send_window};
