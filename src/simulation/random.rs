//! Injectable randomness for the simulation state machine.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// A source of uniform random draws.
///
/// The range helpers have default implementations in terms of `next_f64`, so
/// a scripted source only needs to provide that one method.
pub trait RandomSource: Send {
    /// A uniform value in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// A uniform value in `[low, high]`.
    fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }

    /// A uniform integer in `[low, high]`.
    fn range_i64(&mut self, low: i64, high: i64) -> i64 {
        let span = (high - low + 1) as f64;
        (low + (self.next_f64() * span).floor() as i64).min(high)
    }
}

/// Production random source backed by `StdRng`.
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded when a seed is given, entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl RandomSource for StdRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        self.rng.random_range(low..=high)
    }

    fn range_i64(&mut self, low: i64, high: i64) -> i64 {
        self.rng.random_range(low..=high)
    }
}

/// A scripted source that replays fixed draws, then repeats `fallback`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: std::collections::VecDeque<f64>,
    fallback: f64,
}

#[cfg(any(test, feature = "test-utils"))]
impl SequenceRandom {
    pub fn new(values: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback,
        }
    }

    /// Every draw returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new([], value)
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl RandomSource for SequenceRandom {
    fn next_f64(&mut self) -> f64 {
        self.values.pop_front().unwrap_or(self.fallback)
    }
}
