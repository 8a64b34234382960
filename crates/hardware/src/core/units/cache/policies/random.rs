//! Random Replacement Policy.
//!
//! Evicts a pseudo-random way, drawn from a xorshift64 generator. The generator is seeded
//! with a fixed value and re-seeded on `reset`, so two trials with the same access stream
//! evict the same ways.

use super::ReplacementPolicy;

/// Fixed seed of the victim generator.
const SEED: u64 = 123_456_789;

/// Random Policy state.
#[derive(Debug)]
pub struct RandomPolicy {
    /// Number of ways in the cache.
    ways: usize,
    /// Internal state for the pseudo-random number generator.
    state: u64,
}

impl RandomPolicy {
    /// Creates a new Random policy instance.
    ///
    /// # Arguments
    ///
    /// * `_sets` - The number of sets (unused; the generator is shared by every set).
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(_sets: usize, ways: usize) -> Self {
        Self {
            ways: ways.max(1),
            state: SEED,
        }
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn update(&mut self, _set: usize, _way: usize) {}

    fn get_victim(&mut self, _set: usize) -> usize {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x % self.ways as u64) as usize
    }

    fn reset(&mut self) {
        self.state = SEED;
    }
}
