//! Hardware Prefetcher implementations.
//!
//! This module contains the interface and implementations for the hardware prefetchers that
//! sit beside each cache. Prefetched lines become part of the architectural cache state a trial
//! reports, and any training state is cleared with the cache on `reset_state`.

/// Next-line prefetcher (prefetches sequential cache lines).
pub mod next_line;

/// Stride prefetcher (detects constant-stride access patterns).
pub mod stride;

pub use self::next_line::NextLinePrefetcher;
pub use self::stride::StridePrefetcher;

/// Trait for cache prefetcher implementations.
///
/// Prefetchers observe memory access patterns and generate prefetch
/// requests to reduce cache miss penalties.
pub trait Prefetcher: Send {
    /// Observes a memory access and generates prefetch addresses.
    ///
    /// # Arguments
    ///
    /// * `addr` - The address that was accessed
    /// * `hit` - Whether the access was a cache hit
    ///
    /// # Returns
    ///
    /// A vector of addresses to prefetch. Empty if no prefetches are needed.
    fn observe(&mut self, addr: u64, hit: bool) -> Vec<u64>;

    /// Forgets every learned pattern.
    fn reset(&mut self) {}
}
