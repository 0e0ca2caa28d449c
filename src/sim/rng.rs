//! Seeded simulation RNG
//!
//! Every random decision in the simulation (spawn jitter, sparse pegs,
//! collision jitter, wind direction) draws from this stream, so a fixed
//! seed replays the same game.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Deterministic generator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRng {
    inner: Pcg32,
}

impl SimRng {
    /// Create a generator from a 32-bit seed
    pub fn seed(seed: u32) -> Self {
        Self {
            inner: Pcg32::seed_from_u64(u64::from(seed)),
        }
    }

    /// Pure step: returns a float in [0, 1) and the advanced state
    pub fn next(mut self) -> (f64, Self) {
        let value = self.next_f64();
        (value, self)
    }

    /// Draw a float in [0, 1), advancing in place
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.inner.random::<f64>()
    }

    /// Draw a float in [-0.5, 0.5)
    #[inline]
    pub fn centered(&mut self) -> f32 {
        (self.next_f64() - 0.5) as f32
    }

    /// Bernoulli trial
    #[inline]
    pub fn chance(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// Random sign (+1 or -1)
    #[inline]
    pub fn sign(&mut self) -> f32 {
        if self.next_f64() < 0.5 { -1.0 } else { 1.0 }
    }
}
