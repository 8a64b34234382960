//! Set-Associative Cache Simulator.
//!
//! This module implements a configurable set-associative, write-back, write-allocate cache
//! tag model. It provides:
//! 1. **Lookup:** `set = (addr / line_bytes) % sets`, `tag = addr / (line_bytes * sets)`.
//! 2. **Fill:** Invalid ways are filled lowest-first; the replacement policy is consulted only
//!    once the set is full. Evicting a dirty line charges the next level's latency.
//! 3. **Prefetch:** An optional prefetcher observes demand accesses and installs clean lines.
//! 4. **Inspection:** `CacheInspectable`, the out-of-band snapshot/reset/clean capability.

/// Cache replacement policy implementations (FIFO, LRU, PLRU, Random).
pub mod policies;

use self::policies::{FifoPolicy, LruPolicy, PlruPolicy, RandomPolicy, ReplacementPolicy};
use crate::config::{CacheConfig, Prefetcher as PrefetcherType, ReplacementPolicy as PolicyType};
use crate::core::units::prefetch::{NextLinePrefetcher, Prefetcher, StridePrefetcher};
use crate::inspect::{AccessError, CacheInspectable, CacheLevel, LineDescriptor, LineMetadata};

/// Cache line entry containing tag, validity, and dirty bits.
#[derive(Clone, Copy, Debug, Default)]
struct CacheLine {
    tag: u64,
    valid: bool,
    dirty: bool,
}

/// Cache simulator implementing a set-associative cache with configurable policies.
pub struct CacheSim {
    /// Access latency in cycles, charged by the level above on a miss there.
    pub latency: u64,
    /// When false, accesses bypass this cache and it exposes no state.
    pub enabled: bool,
    level: CacheLevel,
    prefetcher: Option<Box<dyn Prefetcher>>,
    lines: Vec<CacheLine>,
    num_sets: usize,
    ways: usize,
    line_bytes: usize,
    policy: Box<dyn ReplacementPolicy>,
}

impl std::fmt::Debug for CacheSim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSim")
            .field("level", &self.level)
            .field("enabled", &self.enabled)
            .field("sets", &self.num_sets)
            .field("ways", &self.ways)
            .field("line_bytes", &self.line_bytes)
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl CacheSim {
    /// Creates a new cache simulator with the specified configuration.
    ///
    /// # Arguments
    ///
    /// * `level` - Hierarchy level this cache is attached at.
    /// * `config` - Size, associativity, line size, replacement policy, and prefetcher.
    ///   Degenerate geometry is clamped to one set of one 64-byte way.
    pub fn new(level: CacheLevel, config: &CacheConfig) -> Self {
        let ways = config.ways.max(1);
        let line_bytes = if config.line_bytes.is_power_of_two() {
            config.line_bytes
        } else {
            64
        };
        let num_sets = (config.size_bytes / (line_bytes * ways)).max(1);

        let policy: Box<dyn ReplacementPolicy> = match config.policy {
            PolicyType::Fifo => Box::new(FifoPolicy::new(num_sets, ways)),
            PolicyType::Random => Box::new(RandomPolicy::new(num_sets, ways)),
            PolicyType::Plru => Box::new(PlruPolicy::new(num_sets, ways)),
            PolicyType::Lru => Box::new(LruPolicy::new(num_sets, ways)),
        };

        let prefetcher: Option<Box<dyn Prefetcher>> = match config.prefetcher {
            PrefetcherType::NextLine => Some(Box::new(NextLinePrefetcher::new(
                line_bytes,
                config.prefetch_degree,
            ))),
            PrefetcherType::Stride => Some(Box::new(StridePrefetcher::new(
                line_bytes,
                config.prefetch_table_size,
                config.prefetch_degree,
            ))),
            PrefetcherType::None => None,
        };

        Self {
            latency: config.latency,
            enabled: config.enabled,
            level,
            prefetcher,
            lines: vec![CacheLine::default(); num_sets * ways],
            num_sets,
            ways,
            line_bytes,
            policy,
        }
    }

    /// Number of sets.
    pub fn sets(&self) -> usize {
        self.num_sets
    }

    /// Associativity.
    pub fn ways(&self) -> usize {
        self.ways
    }

    /// Line size in bytes.
    pub fn line_bytes(&self) -> usize {
        self.line_bytes
    }

    /// Splits an address into its `(set, tag)` pair.
    pub fn locate(&self, addr: u64) -> (usize, u64) {
        let line = addr / self.line_bytes as u64;
        let set = (line % self.num_sets as u64) as usize;
        let tag = line / self.num_sets as u64;
        (set, tag)
    }

    fn find(&self, set: usize, tag: u64) -> Option<usize> {
        let base = set * self.ways;
        self.lines[base..base + self.ways]
            .iter()
            .position(|line| line.valid && line.tag == tag)
    }

    /// Checks if the cache holds the line containing `addr`.
    pub fn contains(&self, addr: u64) -> bool {
        if !self.enabled {
            return false;
        }
        let (set, tag) = self.locate(addr);
        self.find(set, tag).is_some()
    }

    /// Installs the line containing `addr`, evicting if the set is full.
    ///
    /// # Returns
    ///
    /// The write-back penalty in cycles (`next_level_latency` when the victim was dirty).
    fn install_line(&mut self, addr: u64, is_write: bool, next_level_latency: u64) -> u64 {
        let (set, tag) = self.locate(addr);
        let base = set * self.ways;

        let way = match self.lines[base..base + self.ways]
            .iter()
            .position(|line| !line.valid)
        {
            Some(free) => free,
            None => self.policy.get_victim(set) % self.ways,
        };

        let victim = &mut self.lines[base + way];
        let penalty = if victim.valid && victim.dirty {
            next_level_latency
        } else {
            0
        };

        *victim = CacheLine {
            tag,
            valid: true,
            dirty: is_write,
        };
        self.policy.insert(set, way);

        penalty
    }

    /// Accesses the cache for the specified address.
    ///
    /// Performs a lookup, updates the replacement policy on a hit, installs the line on a
    /// miss, and lets the prefetcher install its candidates.
    ///
    /// # Arguments
    ///
    /// * `addr` - The address to access
    /// * `is_write` - Whether this is a write operation
    /// * `next_level_latency` - Latency of the next level, charged for dirty evictions
    ///
    /// # Returns
    ///
    /// A tuple `(hit, penalty)`; a disabled cache always reports `(false, 0)`.
    pub fn access(&mut self, addr: u64, is_write: bool, next_level_latency: u64) -> (bool, u64) {
        if !self.enabled {
            return (false, 0);
        }

        let (set, tag) = self.locate(addr);
        let mut penalty = 0;

        let hit = match self.find(set, tag) {
            Some(way) => {
                self.policy.update(set, way);
                if is_write {
                    self.lines[set * self.ways + way].dirty = true;
                }
                true
            }
            None => {
                penalty += self.install_line(addr, is_write, next_level_latency);
                false
            }
        };

        let prefetches = match self.prefetcher.as_mut() {
            Some(pref) => pref.observe(addr, hit),
            None => Vec::new(),
        };
        for target in prefetches {
            if !self.contains(target) {
                penalty += self.install_line(target, false, next_level_latency);
            }
        }

        (hit, penalty)
    }

    fn attached(&self) -> Result<(), AccessError> {
        if self.enabled {
            Ok(())
        } else {
            Err(AccessError::NotAttached(self.level))
        }
    }
}

impl CacheInspectable for CacheSim {
    fn level(&self) -> CacheLevel {
        self.level
    }

    fn read_state(&self) -> Result<Vec<LineDescriptor>, AccessError> {
        self.attached()?;
        Ok(self
            .lines
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                let set = idx / self.ways;
                let way = idx % self.ways;
                LineDescriptor {
                    set: set as u32,
                    way: way as u32,
                    tag: line.tag,
                    valid: line.valid,
                    metadata: LineMetadata {
                        dirty: line.dirty,
                        age: self.policy.age(set, way),
                    },
                }
            })
            .collect())
    }

    fn reset_state(&mut self) -> Result<(), AccessError> {
        self.attached()?;
        self.lines.fill(CacheLine::default());
        self.policy.reset();
        if let Some(pref) = self.prefetcher.as_mut() {
            pref.reset();
        }
        Ok(())
    }

    fn writeback(&mut self) -> Result<usize, AccessError> {
        self.attached()?;
        let mut cleaned = 0;
        for line in self.lines.iter_mut().filter(|l| l.valid && l.dirty) {
            line.dirty = false;
            cleaned += 1;
        }
        Ok(cleaned)
    }

    fn valid_set(&self) -> Result<Vec<bool>, AccessError> {
        self.attached()?;
        Ok(self.lines.iter().map(|line| line.valid).collect())
    }
}
