//! Cache State Accessor.
//!
//! This module exposes the architectural state of the simulated caches outside of simulated
//! time. It provides:
//! 1. **Descriptors:** `LineDescriptor` and `LineMetadata`, a snapshot of one way of one set.
//! 2. **Capability:** The `CacheInspectable` trait, implemented by every concrete cache model.
//! 3. **Resolution:** `CacheAccessor`, which resolves a `CacheLevel` against a `Cpu` and applies
//!    an inspection or reset to the cache at that level.
//!
//! None of these operations consume simulated cycles, touch the statistics counters, or advance
//! replacement-policy state: reading a cache never changes what a later access hits or evicts.

use std::fmt;

use thiserror::Error;

use crate::core::Cpu;
use crate::core::units::cache::CacheSim;

/// One level of the simulated cache hierarchy.
///
/// The discriminants are the stable identifiers used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheLevel {
    /// L1 instruction cache.
    L1I = 0,
    /// L1 data cache.
    L1D = 1,
    /// Unified L2 cache.
    L2 = 2,
}

impl CacheLevel {
    /// Every level, in wire-id order.
    pub const ALL: [Self; 3] = [Self::L1I, Self::L1D, Self::L2];

    /// Wire identifier of this level.
    pub fn id(self) -> u64 {
        self as u64
    }

    /// Resolves a wire identifier.
    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            0 => Some(Self::L1I),
            1 => Some(Self::L1D),
            2 => Some(Self::L2),
            _ => None,
        }
    }
}

impl fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::L1I => "L1I",
            Self::L1D => "L1D",
            Self::L2 => "L2",
        })
    }
}

/// Replacement and coherence metadata of one line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineMetadata {
    /// The line holds data not yet written back to the next level.
    pub dirty: bool,
    /// Replacement rank of the way within its set: 0 is the most protected way, larger values
    /// are closer to eviction. Policies without recency state report 0.
    pub age: u32,
}

/// Snapshot of one way of one set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineDescriptor {
    /// Set index.
    pub set: u32,
    /// Way index within the set.
    pub way: u32,
    /// Stored tag (`addr / (line_bytes * sets)`); 0 for lines that were never filled.
    pub tag: u64,
    /// Valid bit.
    pub valid: bool,
    /// Replacement and dirty metadata.
    pub metadata: LineMetadata,
}

impl fmt::Display for LineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set {} way {} tag {:#x}", self.set, self.way, self.tag)?;
        if self.valid {
            f.write_str(" valid")?;
        }
        if self.metadata.dirty {
            f.write_str(" dirty")?;
        }
        write!(f, " age {}", self.metadata.age)
    }
}

/// Errors raised by the cache state accessor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The requested cache is disabled in the topology and has no state to inspect.
    #[error("cache {0} is not attached")]
    NotAttached(CacheLevel),
}

/// Out-of-band inspection and reset of a cache model.
pub trait CacheInspectable {
    /// The hierarchy level this cache sits at.
    fn level(&self) -> CacheLevel;

    /// Snapshots every line, ordered by set then way.
    fn read_state(&self) -> Result<Vec<LineDescriptor>, AccessError>;

    /// Invalidates every line and returns replacement and prefetch state to power-on values.
    fn reset_state(&mut self) -> Result<(), AccessError>;

    /// Cleans every dirty line, keeping it valid.
    ///
    /// # Returns
    ///
    /// The number of lines that were dirty.
    fn writeback(&mut self) -> Result<usize, AccessError>;

    /// Validity bitmap, one entry per line, ordered by set then way.
    fn valid_set(&self) -> Result<Vec<bool>, AccessError>;
}

/// Resolves cache levels against a core.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheAccessor;

impl CacheAccessor {
    /// Borrows the cache at `level`.
    pub fn cache(cpu: &Cpu, level: CacheLevel) -> &CacheSim {
        match level {
            CacheLevel::L1I => &cpu.l1_i_cache,
            CacheLevel::L1D => &cpu.l1_d_cache,
            CacheLevel::L2 => &cpu.l2_cache,
        }
    }

    /// Mutably borrows the cache at `level`.
    pub fn cache_mut(cpu: &mut Cpu, level: CacheLevel) -> &mut CacheSim {
        match level {
            CacheLevel::L1I => &mut cpu.l1_i_cache,
            CacheLevel::L1D => &mut cpu.l1_d_cache,
            CacheLevel::L2 => &mut cpu.l2_cache,
        }
    }

    /// Levels whose cache is attached, in wire-id order.
    pub fn attached(cpu: &Cpu) -> Vec<CacheLevel> {
        CacheLevel::ALL
            .into_iter()
            .filter(|level| Self::cache(cpu, *level).enabled)
            .collect()
    }

    /// Snapshots the cache at `level`.
    pub fn read_state(cpu: &Cpu, level: CacheLevel) -> Result<Vec<LineDescriptor>, AccessError> {
        Self::cache(cpu, level).read_state()
    }

    /// Resets the cache at `level`.
    pub fn reset_state(cpu: &mut Cpu, level: CacheLevel) -> Result<(), AccessError> {
        Self::cache_mut(cpu, level).reset_state()
    }

    /// Cleans the cache at `level`.
    pub fn writeback(cpu: &mut Cpu, level: CacheLevel) -> Result<usize, AccessError> {
        Self::cache_mut(cpu, level).writeback()
    }

    /// Validity bitmap of the cache at `level`.
    pub fn valid_set(cpu: &Cpu, level: CacheLevel) -> Result<Vec<bool>, AccessError> {
        Self::cache(cpu, level).valid_set()
    }

    /// Resets every attached cache.
    pub fn reset_all(cpu: &mut Cpu) -> Result<(), AccessError> {
        for level in Self::attached(cpu) {
            Self::reset_state(cpu, level)?;
        }
        Ok(())
    }
}
