use crate::controller::{CongestionController, ControllerState};
use crate::oracle::{LossOracle, RandomLoss};
use crate::trace::{SimulationReport, ThroughputAccumulator, TraceSample};
use crate::transmitter::{StepOutcome, send_window};
use cwnd_lab_abstract::{ConfigError, SimConfig};
use tracing::{debug, info};

/// Drives one flow through fixed RTT ticks.
pub struct Simulator<O = RandomLoss> {
    config: SimConfig,
    controller: CongestionController,
    oracle: O,

    time: f64,
    ticks: u64,

    /// State at the start of every tick, in order.
    pub trace: Vec<TraceSample>,
    /// Channel outcome of every tick, aligned with `trace`.
    pub outcomes: Vec<StepOutcome>,

    throughput: ThroughputAccumulator,
    pub segments_sent: u64,
    pub loss_events: u64,
}

impl Simulator<RandomLoss> {
    /// Simulator with a random oracle seeded from `config.seed`.
    pub fn seeded(config: SimConfig) -> Result<Self, ConfigError> {
        let oracle = RandomLoss::seeded(config.seed);
        Self::new(config, oracle)
    }
}

impl<O: LossOracle> Simulator<O> {
    /// Validates `config` up front; an invalid config never runs a tick.
    pub fn new(config: SimConfig, oracle: O) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            controller: CongestionController::from_config(&config),
            config,
            oracle,
            time: 0.0,
            ticks: 0,
            trace: Vec::new(),
            outcomes: Vec::new(),
            throughput: ThroughputAccumulator::default(),
            segments_sent: 0,
            loss_events: 0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn current_time(&self) -> f64 {
        self.time
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn controller_state(&self) -> ControllerState {
        self.controller.state()
    }

    pub fn acked_units(&self) -> f64 {
        self.throughput.total()
    }

    /// The time bound is only checked between ticks, so the last tick may end past `sim_time`.
    pub fn is_finished(&self) -> bool {
        self.time >= self.config.sim_time
    }

    /// Run one RTT tick. Returns false once the time bound has been reached.
    pub fn step(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }

        let state = self.controller.state();
        self.trace.push(TraceSample {
            time: self.time,
            cwnd: state.cwnd,
            ssthresh: state.ssthresh,
        });

        let outcome = send_window(
            &mut self.oracle,
            state.cwnd,
            self.config.mss,
            self.config.loss_rate,
        );
        self.throughput.add(outcome.acknowledged_count, self.config.mss);
        self.segments_sent += u64::from(outcome.segment_count);
        if outcome.loss_detected {
            self.loss_events += 1;
            debug!(
                "Loss at t={:.3}s: {}/{} segments acknowledged",
                self.time, outcome.acknowledged_count, outcome.segment_count
            );
        }

        self.controller.advance(&outcome);
        self.outcomes.push(outcome);

        self.time += self.config.rtt;
        self.ticks += 1;
        true
    }

    pub fn run_until_complete(&mut self) {
        info!(
            "Running {} for {}s (rtt={}s, loss={})",
            self.config.algorithm, self.config.sim_time, self.config.rtt, self.config.loss_rate
        );
        while self.step() {}
        info!(
            "Simulation finished after {} ticks: {} segments sent, {} loss events",
            self.ticks, self.segments_sent, self.loss_events
        );
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            ticks: self.ticks,
            end_time: self.time,
            trace: self.trace.clone(),
            outcomes: self.outcomes.clone(),
            acked_units: self.throughput.total(),
            throughput: self.throughput.rate(self.config.sim_time),
            segments_sent: self.segments_sent,
            loss_events: self.loss_events,
        }
    }

    pub fn into_oracle(self) -> O {
        self.oracle
    }
}

/// Run a whole simulation against `oracle` and return its report.
pub fn run<O: LossOracle>(config: SimConfig, oracle: O) -> Result<SimulationReport, ConfigError> {
    let mut sim = Simulator::new(config, oracle)?;
    sim.run_until_complete();
    Ok(sim.export_report())
}
