pub mod config;
pub mod scenario;

pub use config::{Algorithm, ConfigError, MAX_WINDOW_SEGMENTS, SimConfig};
pub use scenario::{Scenario, ScenarioAssertion, SimConfigOverride};
