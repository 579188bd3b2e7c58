use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Congestion-control variant applied when a loss is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Collapse the window to a single segment on loss.
    Tahoe,
    /// Halve the window on loss.
    #[default]
    Reno,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Tahoe => f.write_str("tahoe"),
            Algorithm::Reno => f.write_str("reno"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tahoe" => Ok(Algorithm::Tahoe),
            "reno" => Ok(Algorithm::Reno),
            other => Err(ConfigError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Rejected configuration. Raised before the first tick runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid configuration: rtt must be a positive number of seconds (got {0})")]
    Rtt(f64),
    #[error("invalid configuration: sim_time must be a positive number of seconds (got {0})")]
    SimTime(f64),
    #[error("invalid configuration: mss must be positive (got {0})")]
    SegmentSize(f64),
    #[error("invalid configuration: loss_rate must lie in [0, 1] (got {0})")]
    LossRate(f64),
    #[error("invalid configuration: initial_cwnd must be at least 1 segment (got {0})")]
    InitialCwnd(f64),
    #[error("invalid configuration: ssthresh_init must be at least 2 segments (got {0})")]
    Ssthresh(f64),
    #[error("invalid configuration: cwnd_cap ({cap}) must be finite and not below initial_cwnd ({initial})")]
    CwndCap { cap: f64, initial: f64 },
    #[error("invalid configuration: cwnd_cap / mss ({0}) exceeds the limit of 4294967295 segments per window")]
    WindowSegments(f64),
    #[error("unknown algorithm '{0}'. Try 'tahoe' or 'reno'.")]
    UnknownAlgorithm(String),
}

/// Largest number of segments a single window may carry.
pub const MAX_WINDOW_SEGMENTS: u32 = u32::MAX;

/// Parameters of one simulated flow. Sizes are in segments, times in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub rtt: f64,
    pub sim_time: f64,
    /// Segment size used for throughput accounting.
    pub mss: f64,
    /// Independent per-packet loss probability.
    pub loss_rate: f64,
    pub algorithm: Algorithm,
    pub initial_cwnd: f64,
    pub ssthresh_init: f64,
    /// Upper bound on the window, keeps loss-free runs from growing without limit.
    pub cwnd_cap: f64,
    /// Seed for the random loss oracle built by the hosting program.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rtt: 0.05,
            sim_time: 20.0,
            mss: 1.0,
            loss_rate: 0.01,
            algorithm: Algorithm::Reno,
            initial_cwnd: 1.0,
            ssthresh_init: 64.0,
            cwnd_cap: 1000.0,
            seed: 0,
        }
    }
}

impl SimConfig {
    /// Check every field against its allowed range. NaN fails every rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_positive(self.rtt) {
            return Err(ConfigError::Rtt(self.rtt));
        }
        if !is_positive(self.sim_time) {
            return Err(ConfigError::SimTime(self.sim_time));
        }
        if !is_positive(self.mss) {
            return Err(ConfigError::SegmentSize(self.mss));
        }
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(ConfigError::LossRate(self.loss_rate));
        }
        if !(self.initial_cwnd.is_finite() && self.initial_cwnd >= 1.0) {
            return Err(ConfigError::InitialCwnd(self.initial_cwnd));
        }
        if !(self.ssthresh_init.is_finite() && self.ssthresh_init >= 2.0) {
            return Err(ConfigError::Ssthresh(self.ssthresh_init));
        }
        if !(self.cwnd_cap.is_finite() && self.cwnd_cap >= self.initial_cwnd) {
            return Err(ConfigError::CwndCap {
                cap: self.cwnd_cap,
                initial: self.initial_cwnd,
            });
        }
        if self.cwnd_cap / self.mss > f64::from(MAX_WINDOW_SEGMENTS) {
            return Err(ConfigError::WindowSegments(self.cwnd_cap / self.mss));
        }
        Ok(())
    }

    /// Packets sent by a window at the cap, rounded the same way as any window.
    pub fn max_window_segments(&self) -> f64 {
        (self.cwnd_cap / self.mss).round_ties_even().max(1.0)
    }

    /// Ticks the driver will run: `time += rtt` until `time >= sim_time`,
    /// including the floating-point drift of that accumulation.
    pub fn tick_count(&self) -> u64 {
        let mut time = 0.0;
        let mut ticks = 0;
        while time < self.sim_time {
            time += self.rtt;
            ticks += 1;
        }
        ticks
    }

    /// Highest rate the flow could reach: a window at the cap acknowledged in
    /// full on every tick, the final partial tick included.
    ///
    /// Equals `cwnd_cap * mss / rtt` when `cwnd_cap / mss` is integral and
    /// `sim_time` is a whole number of RTTs.
    pub fn throughput_ceiling(&self) -> f64 {
        self.max_window_segments() * self.mss * self.tick_count() as f64 / self.sim_time
    }
}

fn is_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let base = SimConfig::default();

        let cfg = SimConfig { rtt: 0.0, ..base.clone() };
        assert_eq!(cfg.validate(), Err(ConfigError::Rtt(0.0)));

        let cfg = SimConfig { sim_time: -1.0, ..base.clone() };
        assert_eq!(cfg.validate(), Err(ConfigError::SimTime(-1.0)));

        let cfg = SimConfig { mss: 0.0, ..base.clone() };
        assert_eq!(cfg.validate(), Err(ConfigError::SegmentSize(0.0)));

        let cfg = SimConfig { loss_rate: 1.5, ..base.clone() };
        assert_eq!(cfg.validate(), Err(ConfigError::LossRate(1.5)));

        let cfg = SimConfig { initial_cwnd: 0.5, ..base.clone() };
        assert_eq!(cfg.validate(), Err(ConfigError::InitialCwnd(0.5)));

        let cfg = SimConfig { ssthresh_init: 1.0, ..base.clone() };
        assert_eq!(cfg.validate(), Err(ConfigError::Ssthresh(1.0)));

        let cfg = SimConfig {
            initial_cwnd: 10.0,
            cwnd_cap: 4.0,
            ..base
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::CwndCap {
                cap: 4.0,
                initial: 10.0
            })
        );
    }

    #[test]
    fn oversized_windows_are_rejected() {
        let cfg = SimConfig {
            cwnd_cap: 1e10,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::WindowSegments(1e10)));

        let cfg = SimConfig {
            cwnd_cap: 1000.0,
            mss: 1e-9,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::WindowSegments(_))));
    }

    #[test]
    fn tick_count_includes_partial_tick() {
        let cfg = SimConfig {
            rtt: 1.0,
            sim_time: 2.5,
            ..Default::default()
        };
        assert_eq!(cfg.tick_count(), 3);

        let cfg = SimConfig {
            rtt: 0.5,
            sim_time: 2.0,
            ..Default::default()
        };
        assert_eq!(cfg.tick_count(), 4);
    }

    #[test]
    fn ceiling_accounts_for_rounding_and_partial_tick() {
        let partial = SimConfig {
            rtt: 1.0,
            sim_time: 2.5,
            cwnd_cap: 1.0,
            ..Default::default()
        };
        assert_eq!(partial.throughput_ceiling(), 3.0 / 2.5);

        let fractional = SimConfig {
            rtt: 1.0,
            sim_time: 10.0,
            cwnd_cap: 1.5,
            ..Default::default()
        };
        assert_eq!(fractional.max_window_segments(), 2.0);
        assert_eq!(fractional.throughput_ceiling(), 2.0);

        let small_mss = SimConfig {
            rtt: 1.0,
            sim_time: 10.0,
            mss: 0.5,
            cwnd_cap: 4.0,
            ..Default::default()
        };
        assert_eq!(small_mss.throughput_ceiling(), 4.0);
    }

    #[test]
    fn nan_loss_rate_is_rejected() {
        let cfg = SimConfig {
            loss_rate: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::LossRate(_))));
    }

    #[test]
    fn boundary_loss_rates_are_accepted() {
        for p in [0.0, 1.0] {
            let cfg = SimConfig {
                loss_rate: p,
                ..Default::default()
            };
            assert!(cfg.validate().is_ok());
        }
    }

    #[test]
    fn algorithm_parses_case_insensitively() {
        assert_eq!("Tahoe".parse::<Algorithm>(), Ok(Algorithm::Tahoe));
        assert_eq!("reno".parse::<Algorithm>(), Ok(Algorithm::Reno));
        assert!("cubic".parse::<Algorithm>().is_err());
        assert_eq!(Algorithm::Tahoe.to_string(), "tahoe");
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg: SimConfig = toml::from_str("algorithm = \"tahoe\"\nloss_rate = 0.05\n").unwrap();
        assert_eq!(cfg.algorithm, Algorithm::Tahoe);
        assert_eq!(cfg.loss_rate, 0.05);
        assert_eq!(cfg.rtt, 0.05);
        assert_eq!(cfg.cwnd_cap, 1000.0);
    }
}
