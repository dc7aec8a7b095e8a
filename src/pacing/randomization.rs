//! Randomization Module
//!
//! Every random choice the scheduler makes (identity order, destination,
//! amount, pauses) comes from one seedable RNG so a run can be replayed.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::time::Duration;

/// Randomizer for pacing decisions
pub struct Randomizer {
    rng: StdRng,
}

impl Randomizer {
    /// Create a new randomizer with optional seed
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Reset the RNG with a new seed
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Shuffle in place (uniform permutation)
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Pick one element uniformly
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// Uniform amount in `[min, max]`
    pub fn amount_in_range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// Generate a random delay within a range
    pub fn random_delay(&mut self, min_ms: u64, max_ms: u64) -> Duration {
        Duration::from_millis(self.amount_in_range(min_ms, max_ms))
    }
}

impl Default for Randomizer {
    fn default() -> Self {
        Self::new(None)
    }
}
