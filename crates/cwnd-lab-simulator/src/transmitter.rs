use crate::oracle::LossOracle;
use serde::Serialize;

/// What happened to one window of packets during a single RTT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StepOutcome {
    /// At least one packet in the window was lost.
    pub loss_detected: bool,
    pub acknowledged_count: u32,
    /// Packets attempted this tick.
    pub segment_count: u32,
}

/// Number of packets a window of `cwnd` represents. Never less than one.
///
/// Halfway windows (e.g. 32.5 after halving 65) round to the even neighbour.
pub fn segment_count(cwnd: f64, segment_size: f64) -> u32 {
    (cwnd / segment_size).round_ties_even().max(1.0) as u32
}

/// Push one window through the channel.
///
/// Every packet is attempted even after an earlier one in the same window was
/// lost: one RTT carries at most one congestion signal.
pub fn send_window<O: LossOracle + ?Sized>(
    oracle: &mut O,
    cwnd: f64,
    segment_size: f64,
    loss_probability: f64,
) -> StepOutcome {
    let segments = segment_count(cwnd, segment_size);
    let mut outcome = StepOutcome {
        segment_count: segments,
        ..Default::default()
    };
    for _ in 0..segments {
        if oracle.decide_loss(loss_probability) {
            outcome.loss_detected = true;
        } else {
            outcome.acknowledged_count += 1;
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{RandomLoss, ScriptedLoss};

    #[test]
    fn sub_unit_window_still_sends_one_segment() {
        assert_eq!(segment_count(0.6, 1.0), 1);
        assert_eq!(segment_count(0.2, 1.0), 1);

        let mut oracle = ScriptedLoss::default();
        let outcome = send_window(&mut oracle, 0.6, 1.0, 0.0);
        assert_eq!(oracle.consumed(), 1);
        assert_eq!(outcome.segment_count, 1);
        assert_eq!(outcome.acknowledged_count, 1);
        assert!(!outcome.loss_detected);
    }

    #[test]
    fn segment_count_rounds_to_nearest() {
        assert_eq!(segment_count(4.4, 1.0), 4);
        assert_eq!(segment_count(4.5, 1.0), 4);
        assert_eq!(segment_count(5.5, 1.0), 6);
        assert_eq!(segment_count(32.5, 1.0), 32);
        assert_eq!(segment_count(10.0, 2.0), 5);
    }

    #[test]
    fn loss_does_not_stop_the_window() {
        let mut oracle = ScriptedLoss::new([false, true, false, false]);
        let outcome = send_window(&mut oracle, 4.0, 1.0, 0.5);
        assert_eq!(oracle.consumed(), 4);
        assert!(outcome.loss_detected);
        assert_eq!(outcome.acknowledged_count, 3);
    }

    #[test]
    fn every_packet_lost() {
        let mut oracle = RandomLoss::seeded(9);
        let outcome = send_window(&mut oracle, 8.0, 1.0, 1.0);
        assert!(outcome.loss_detected);
        assert_eq!(outcome.acknowledged_count, 0);
        assert_eq!(outcome.segment_count, 8);
    }

    #[test]
    fn clean_window_acknowledges_everything() {
        let mut oracle = RandomLoss::seeded(9);
        let outcome = send_window(&mut oracle, 16.0, 1.0, 0.0);
        assert_eq!(
            outcome,
            StepOutcome {
                loss_detected: false,
                acknowledged_count: 16,
                segment_count: 16,
            }
        );
    }
}
