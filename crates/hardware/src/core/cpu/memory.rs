//! Memory Access Helpers.
//!
//! This module provides the interface between the CPU and the memory subsystem.
//! It performs the following:
//! 1. **Range Checking:** Unmapped or misaligned accesses raise the matching trap before any
//!    cache is touched, so a faulting access leaves no footprint.
//! 2. **Cache Simulation:** Walks L1 (I or D) → L2 → DRAM, updating tags and statistics.
//! 3. **Latency Modeling:** Accumulates hit latencies, dirty write-back penalties, DRAM
//!    controller latency, and bus transit time.

use super::Cpu;
use crate::common::{AccessType, Trap};

impl Cpu {
    /// Simulates a memory access through the cache hierarchy.
    ///
    /// # Arguments
    ///
    /// * `addr` - The physical address to access.
    /// * `access` - The type of memory access.
    ///
    /// # Returns
    ///
    /// The latency penalty in cycles beyond the single base cycle of the instruction.
    pub fn simulate_memory_access(&mut self, addr: u64, access: AccessType) -> u64 {
        let is_inst = matches!(access, AccessType::Fetch);
        let is_write = matches!(access, AccessType::Write);
        let l2_latency = if self.l2_cache.enabled {
            self.l2_cache.latency
        } else {
            self.system.transit_time(self.l1_d_cache.line_bytes())
        };

        let mut total_penalty = 0;

        let l1 = if is_inst {
            &mut self.l1_i_cache
        } else {
            &mut self.l1_d_cache
        };
        if l1.enabled {
            let (hit, penalty) = l1.access(addr, is_write, l2_latency);
            total_penalty += penalty;
            match (is_inst, hit) {
                (true, true) => self.stats.icache_hits += 1,
                (true, false) => self.stats.icache_misses += 1,
                (false, true) => self.stats.dcache_hits += 1,
                (false, false) => self.stats.dcache_misses += 1,
            }
            if hit {
                return total_penalty;
            }
        }

        if self.l2_cache.enabled {
            total_penalty += self.l2_cache.latency;
            let writeback = self.system.transit_time(self.l2_cache.line_bytes());
            let (hit, penalty) = self.l2_cache.access(addr, is_write, writeback);
            total_penalty += penalty;
            if hit {
                self.stats.l2_hits += 1;
                return total_penalty;
            }
            self.stats.l2_misses += 1;
        }

        let line = self.l2_cache.line_bytes();
        total_penalty + self.system.transit_time(8) + self.system.dram_fill_latency(addr, line)
    }

    fn check_access(&self, addr: u64, size: usize, access: AccessType) -> Result<(), Trap> {
        if size > 1 && addr % size as u64 != 0 {
            return Err(access.misaligned(addr));
        }
        if !self.system.memory.contains(addr, size as u64) {
            return Err(access.access_fault(addr));
        }
        Ok(())
    }

    /// Fetches the 32-bit instruction at `pc`.
    ///
    /// # Returns
    ///
    /// The instruction word and the fetch penalty in cycles.
    pub fn fetch(&mut self, pc: u64) -> Result<(u32, u64), Trap> {
        self.check_access(pc, 4, AccessType::Fetch)?;
        let penalty = self.simulate_memory_access(pc, AccessType::Fetch);
        let inst = self.system.memory.read(pc, 4, AccessType::Fetch)?;
        Ok((inst as u32, penalty))
    }

    /// Loads `size` bytes from `addr`, zero-extended.
    ///
    /// # Returns
    ///
    /// The loaded value and the access penalty in cycles.
    pub fn load(&mut self, addr: u64, size: usize) -> Result<(u64, u64), Trap> {
        self.check_access(addr, size, AccessType::Read)?;
        let penalty = self.simulate_memory_access(addr, AccessType::Read);
        let val = self.system.memory.read(addr, size, AccessType::Read)?;
        Ok((val, penalty))
    }

    /// Stores the low `size` bytes of `val` to `addr`.
    ///
    /// # Returns
    ///
    /// The access penalty in cycles.
    pub fn store(&mut self, addr: u64, size: usize, val: u64) -> Result<u64, Trap> {
        self.check_access(addr, size, AccessType::Write)?;
        let penalty = self.simulate_memory_access(addr, AccessType::Write);
        self.system.memory.write(addr, size, val)?;
        Ok(penalty)
    }
}
