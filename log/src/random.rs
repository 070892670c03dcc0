//! Randomness for retry jitter.

use std::ops::Range;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniformly distributed integers.
pub trait RandomSource: Send + Sync {
    /// Returns a value in `range`. The range must not be empty.
    fn next_in_range(&self, range: Range<i64>) -> i64;
}

/// Draws from the thread-local generator on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_in_range(&self, range: Range<i64>) -> i64 {
        rand::rng().random_range(range)
    }
}

/// Deterministic generator for reproducible retries.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_in_range(&self, range: Range<i64>) -> i64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(range)
    }
}
