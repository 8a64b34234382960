//! Cache Replacement Policies.
//!
//! Implements the algorithms for selecting victim lines in set-associative caches.
//!
//! # Policies
//!
//! - `Fifo`: First-In, First-Out.
//! - `Lru`: Least Recently Used.
//! - `Plru`: Pseudo-LRU (one MRU bit per way).
//! - `Random`: Seeded pseudo-random selection.
//!
//! The cache fills invalid ways itself and only asks the policy for a victim once a set is
//! full. Policies distinguish a fill (`insert`) from a hit (`update`) so that insertion-order
//! policies are not disturbed by hits.

/// First-In, First-Out replacement policy.
pub mod fifo;

/// Least Recently Used replacement policy.
pub mod lru;

/// Pseudo-LRU replacement policy.
pub mod plru;

/// Random replacement policy.
pub mod random;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;
pub use plru::PlruPolicy;
pub use random::RandomPolicy;

/// Trait for cache replacement policies.
pub trait ReplacementPolicy: Send {
    /// Updates the policy state when a resident line is hit.
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    /// * `way` - The way index within the set that was accessed.
    fn update(&mut self, set: usize, way: usize);

    /// Updates the policy state when a line is filled into `way`.
    fn insert(&mut self, set: usize, way: usize) {
        self.update(set, way);
    }

    /// Selects a victim line to evict from a full set.
    ///
    /// # Returns
    ///
    /// The index of the way to evict.
    fn get_victim(&mut self, set: usize) -> usize;

    /// Replacement rank of `way` in `set`: 0 is the most protected, larger is closer to
    /// eviction. Must not change any state.
    fn age(&self, _set: usize, _way: usize) -> u32 {
        0
    }

    /// Returns every set to its power-on state.
    fn reset(&mut self);
}
