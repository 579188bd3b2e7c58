use crate::transmitter::StepOutcome;
use cwnd_lab_abstract::SimConfig;
use serde::Serialize;

/// Window state at the start of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TraceSample {
    pub time: f64,
    pub cwnd: f64,
    pub ssthresh: f64,
}

/// Running total of acknowledged segment-size units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThroughputAccumulator {
    acked_units: f64,
}

impl ThroughputAccumulator {
    pub fn add(&mut self, acknowledged: u32, segment_size: f64) {
        self.acked_units += acknowledged as f64 * segment_size;
    }

    pub fn total(&self) -> f64 {
        self.acked_units
    }

    /// Units per second over `duration` seconds.
    pub fn rate(&self, duration: f64) -> f64 {
        self.acked_units / duration
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub ticks: u64,
    /// Simulated time at which the loop stopped (may exceed `sim_time` by less than one RTT).
    pub end_time: f64,
    pub trace: Vec<TraceSample>,
    pub outcomes: Vec<StepOutcome>,
    pub acked_units: f64,
    /// Acknowledged units per second of `sim_time`.
    pub throughput: f64,
    pub segments_sent: u64,
    pub loss_events: u64,
}

impl SimulationReport {
    pub fn peak_cwnd(&self) -> Option<f64> {
        self.trace.iter().map(|s| s.cwnd).reduce(f64::max)
    }

    /// `(time, cwnd)` pairs, as handed to a plotting consumer.
    pub fn cwnd_series(&self) -> Vec<(f64, f64)> {
        self.trace.iter().map(|s| (s.time, s.cwnd)).collect()
    }

    /// Points of a post-step plot: each value holds until the next sample,
    /// and the last one until `end_time`.
    pub fn step_series(&self, value: impl Fn(&TraceSample) -> f64) -> Vec<(f64, f64)> {
        let mut points = Vec::with_capacity(self.trace.len() * 2);
        for (i, sample) in self.trace.iter().enumerate() {
            let until = self
                .trace
                .get(i + 1)
                .map(|next| next.time)
                .unwrap_or(self.end_time);
            points.push((sample.time, value(sample)));
            points.push((until, value(sample)));
        }
        points
    }

    /// One-line caption for charts and logs.
    pub fn title(&self) -> String {
        format!(
            "TCP {} simulation: loss={}, RTT={}s, throughput={:.2} MSS/s",
            self.config.algorithm, self.config.loss_rate, self.config.rtt, self.throughput
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(samples: &[(f64, f64)], end_time: f64) -> SimulationReport {
        SimulationReport {
            config: SimConfig::default(),
            ticks: samples.len() as u64,
            end_time,
            trace: samples
                .iter()
                .map(|&(time, cwnd)| TraceSample {
                    time,
                    cwnd,
                    ssthresh: 64.0,
                })
                .collect(),
            outcomes: Vec::new(),
            acked_units: 0.0,
            throughput: 0.0,
            segments_sent: 0,
            loss_events: 0,
        }
    }

    #[test]
    fn accumulator_converts_to_rate() {
        let mut acc = ThroughputAccumulator::default();
        acc.add(3, 2.0);
        acc.add(4, 2.0);
        assert_eq!(acc.total(), 14.0);
        assert_eq!(acc.rate(7.0), 2.0);
    }

    #[test]
    fn step_series_holds_each_value() {
        let r = report(&[(0.0, 1.0), (0.5, 2.0), (1.0, 4.0)], 1.5);
        assert_eq!(
            r.step_series(|s| s.cwnd),
            vec![
                (0.0, 1.0),
                (0.5, 1.0),
                (0.5, 2.0),
                (1.0, 2.0),
                (1.0, 4.0),
                (1.5, 4.0)
            ]
        );
        assert_eq!(r.peak_cwnd(), Some(4.0));
        assert_eq!(r.cwnd_series(), vec![(0.0, 1.0), (0.5, 2.0), (1.0, 4.0)]);
    }

    #[test]
    fn empty_trace_has_no_peak() {
        let r = report(&[], 0.0);
        assert_eq!(r.peak_cwnd(), None);
        assert!(r.step_series(|s| s.cwnd).is_empty());
    }

    #[test]
    fn title_names_algorithm_and_channel() {
        let mut r = report(&[(0.0, 1.0)], 0.05);
        r.throughput = 12.5;
        assert_eq!(
            r.title(),
            "TCP reno simulation: loss=0.01, RTT=0.05s, throughput=12.50 MSS/s"
        );
    }
}
