use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Decides the fate of a single packet.
pub trait LossOracle {
    /// Returns `true` if the packet is lost. `probability` is the configured
    /// per-packet loss rate in `[0, 1]`.
    fn decide_loss(&mut self, probability: f64) -> bool;
}

impl<T: LossOracle + ?Sized> LossOracle for &mut T {
    fn decide_loss(&mut self, probability: f64) -> bool {
        (**self).decide_loss(probability)
    }
}

/// Independent Bernoulli trial per packet, backed by any [`Rng`].
#[derive(Debug, Clone)]
pub struct RandomLoss<R = StdRng> {
    rng: R,
}

impl<R: Rng> RandomLoss<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomLoss<StdRng> {
    /// Reproducible oracle: the same seed yields the same loss pattern.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> LossOracle for RandomLoss<R> {
    fn decide_loss(&mut self, probability: f64) -> bool {
        // random::<f64>() is in [0, 1): p = 0 never loses, p = 1 always does.
        self.rng.random::<f64>() < probability
    }
}

/// Replays a fixed list of per-packet decisions, ignoring the probability.
///
/// Once the script runs out every further packet is delivered.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLoss {
    script: VecDeque<bool>,
    consumed: usize,
}

impl ScriptedLoss {
    pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: script.into_iter().collect(),
            consumed: 0,
        }
    }

    /// Number of decisions taken so far, scripted or not.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl LossOracle for ScriptedLoss {
    fn decide_loss(&mut self, _probability: f64) -> bool {
        self.consumed += 1;
        self.script.pop_front().unwrap_or(false)
    }
}
