use crate::config::{Algorithm, SimConfig};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

/// Optional replacements for individual [`SimConfig`] fields.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SimConfigOverride {
    pub rtt: Option<f64>,
    pub sim_time: Option<f64>,
    pub mss: Option<f64>,
    pub loss_rate: Option<f64>,
    pub algorithm: Option<Algorithm>,
    pub initial_cwnd: Option<f64>,
    pub ssthresh_init: Option<f64>,
    pub cwnd_cap: Option<f64>,
    pub seed: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.rtt {
            config.rtt = v;
        }
        if let Some(v) = self.sim_time {
            config.sim_time = v;
        }
        if let Some(v) = self.mss {
            config.mss = v;
        }
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.algorithm {
            config.algorithm = v;
        }
        if let Some(v) = self.initial_cwnd {
            config.initial_cwnd = v;
        }
        if let Some(v) = self.ssthresh_init {
            config.ssthresh_init = v;
        }
        if let Some(v) = self.cwnd_cap {
            config.cwnd_cap = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioAssertion {
    /// Assert that the final throughput (units per second) is within range
    Throughput { min: f64, max: Option<f64> },
    /// Assert that the largest cwnd sampled in the trace is within range
    CwndMax { min: f64, max: Option<f64> },
    /// Assert that cwnd reaches at least `from_at_least` and later drops to at most `to_at_most`
    CwndDrop { from_at_least: f64, to_at_most: f64 },
    /// Assert that the number of ticks with a detected loss is within range
    LossEvents { min: u64, max: Option<u64> },
    /// Assert that the run executed a number of ticks within range
    TickCount { min: u64, max: Option<u64> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_only_touches_given_fields() {
        let mut config = SimConfig::default();
        let patch = SimConfigOverride {
            loss_rate: Some(0.2),
            algorithm: Some(Algorithm::Tahoe),
            ..Default::default()
        };
        patch.apply_to(&mut config);

        assert_eq!(config.loss_rate, 0.2);
        assert_eq!(config.algorithm, Algorithm::Tahoe);
        assert_eq!(config.rtt, SimConfig::default().rtt);
        assert_eq!(config.ssthresh_init, SimConfig::default().ssthresh_init);
    }

    #[test]
    fn scenario_parses_tagged_assertions() {
        let src = r#"
name = "reno-lossy"

[config]
algorithm = "reno"
loss_rate = 0.05
seed = 7

[[assertions]]
type = "throughput"
min = 1.0

[[assertions]]
type = "cwnd_drop"
from_at_least = 8.0
to_at_most = 4.0
"#;
        let scenario: Scenario = toml::from_str(src).unwrap();
        assert_eq!(scenario.name, "reno-lossy");
        assert!(scenario.description.is_empty());
        assert_eq!(scenario.config.seed, Some(7));
        assert_eq!(
            scenario.assertions,
            vec![
                ScenarioAssertion::Throughput { min: 1.0, max: None },
                ScenarioAssertion::CwndDrop {
                    from_at_least: 8.0,
                    to_at_most: 4.0
                },
            ]
        );
    }
}
