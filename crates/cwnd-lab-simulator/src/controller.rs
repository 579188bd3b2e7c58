use crate::transmitter::StepOutcome;
use cwnd_lab_abstract::{Algorithm, SimConfig};
use serde::Serialize;
use tracing::debug;

/// Smallest window the controller will ever hold.
pub const MIN_CWND: f64 = 1.0;
/// Smallest slow-start threshold the controller will ever hold.
pub const MIN_SSTHRESH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    SlowStart,
    CongestionAvoidance,
}

/// Window and threshold, both in segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControllerState {
    pub cwnd: f64,
    pub ssthresh: f64,
}

impl ControllerState {
    /// Derived on demand so it can never disagree with cwnd/ssthresh.
    pub fn phase(&self) -> Phase {
        if self.cwnd < self.ssthresh {
            Phase::SlowStart
        } else {
            Phase::CongestionAvoidance
        }
    }
}

/// Per-RTT Tahoe/Reno window update.
#[derive(Debug, Clone)]
pub struct CongestionController {
    algorithm: Algorithm,
    cwnd_cap: f64,
    state: ControllerState,
}

impl CongestionController {
    pub fn new(algorithm: Algorithm, initial_cwnd: f64, ssthresh: f64, cwnd_cap: f64) -> Self {
        Self {
            algorithm,
            cwnd_cap,
            state: ControllerState {
                cwnd: initial_cwnd,
                ssthresh,
            },
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            config.algorithm,
            config.initial_cwnd,
            config.ssthresh_init,
            config.cwnd_cap,
        )
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn cwnd(&self) -> f64 {
        self.state.cwnd
    }

    pub fn ssthresh(&self) -> f64 {
        self.state.ssthresh
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Apply one tick of feedback and return the new window.
    ///
    /// A lost window never grows and a clean window never shrinks.
    pub fn advance(&mut self, outcome: &StepOutcome) -> f64 {
        let phase = self.state.phase();
        let ControllerState { cwnd, ssthresh } = self.state;

        let (next_cwnd, next_ssthresh) = if outcome.loss_detected {
            let ssthresh = (cwnd / 2.0).max(MIN_SSTHRESH);
            let cwnd = match self.algorithm {
                Algorithm::Tahoe => MIN_CWND,
                Algorithm::Reno => (cwnd / 2.0).max(MIN_CWND),
            };
            (cwnd, ssthresh)
        } else {
            match phase {
                Phase::SlowStart => (cwnd * 2.0, ssthresh),
                Phase::CongestionAvoidance => (cwnd + 1.0, ssthresh),
            }
        };

        self.state = ControllerState {
            cwnd: next_cwnd.min(self.cwnd_cap),
            ssthresh: next_ssthresh,
        };
        debug!(
            "{} {:?} loss={} acked={} cwnd {} -> {} ssthresh {}",
            self.algorithm,
            phase,
            outcome.loss_detected,
            outcome.acknowledged_count,
            cwnd,
            self.state.cwnd,
            self.state.ssthresh
        );
        self.state.cwnd
    }
}
