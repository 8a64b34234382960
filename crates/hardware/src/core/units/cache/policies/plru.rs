//! Pseudo-LRU (PLRU) Replacement Policy.
//!
//! Bit-PLRU approximates LRU with a single MRU bit per way. An access sets the way's bit;
//! when every bit in the set would be set, all bits except the accessed one are cleared.
//! The victim is the lowest way whose bit is clear.
//!
//! The reported age is 0 for ways whose MRU bit is set and 1 otherwise.

use super::ReplacementPolicy;

/// PLRU Policy state.
#[derive(Debug)]
pub struct PlruPolicy {
    /// MRU bitmask for each set.
    usage: Vec<u64>,
    /// Number of ways in the cache (at most 64).
    ways: usize,
}

impl PlruPolicy {
    /// Creates a new PLRU policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache, clamped to 64.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            usage: vec![0; sets],
            ways: ways.min(64),
        }
    }

    fn full_mask(&self) -> u64 {
        if self.ways >= 64 {
            u64::MAX
        } else {
            (1 << self.ways) - 1
        }
    }
}

impl ReplacementPolicy for PlruPolicy {
    fn update(&mut self, set: usize, way: usize) {
        let mask = 1u64 << (way % 64);
        self.usage[set] |= mask;
        if self.usage[set] & self.full_mask() == self.full_mask() {
            self.usage[set] = mask;
        }
    }

    fn get_victim(&mut self, set: usize) -> usize {
        (0..self.ways)
            .find(|&i| (self.usage[set] >> i) & 1 == 0)
            .unwrap_or(0)
    }

    fn age(&self, set: usize, way: usize) -> u32 {
        u32::from((self.usage[set] >> (way % 64)) & 1 == 0)
    }

    fn reset(&mut self) {
        self.usage.fill(0);
    }
}
