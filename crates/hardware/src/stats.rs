//! Simulation statistics collection and reporting.
//!
//! This module tracks per-trial and per-campaign metrics. It provides:
//! 1. **Cycle and IPC:** Total cycles, retired instructions, and derived CPI.
//! 2. **Instruction mix:** Counts by category (ALU, load, store, branch, system).
//! 3. **Cache hierarchy:** Hit/miss counts for L1-I, L1-D, and L2.
//!
//! The per-trial counters live on the CPU and are reset every time a workload is bound;
//! the driver folds each finished trial into a campaign-wide total with [`SimStats::merge`].

/// Simulation statistics tracking performance metrics of one trial (or a sum of trials).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Total simulated cycles elapsed.
    pub cycles: u64,
    /// Number of instructions retired.
    pub instructions_retired: u64,

    /// Count of load instructions retired.
    pub inst_load: u64,
    /// Count of store instructions retired.
    pub inst_store: u64,
    /// Count of branch/jump instructions retired.
    pub inst_branch: u64,
    /// Count of ALU (non-load/store/branch/system) instructions retired.
    pub inst_alu: u64,
    /// Count of system (ECALL, EBREAK, FENCE) instructions retired.
    pub inst_system: u64,

    /// Stall cycles spent waiting on caches and DRAM.
    pub stalls_mem: u64,

    /// L1 instruction cache hit count.
    pub icache_hits: u64,
    /// L1 instruction cache miss count.
    pub icache_misses: u64,
    /// L1 data cache hit count.
    pub dcache_hits: u64,
    /// L1 data cache miss count.
    pub dcache_misses: u64,
    /// L2 cache hit count.
    pub l2_hits: u64,
    /// L2 cache miss count.
    pub l2_misses: u64,
}

impl SimStats {
    /// Adds every counter of `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.cycles += other.cycles;
        self.instructions_retired += other.instructions_retired;
        self.inst_load += other.inst_load;
        self.inst_store += other.inst_store;
        self.inst_branch += other.inst_branch;
        self.inst_alu += other.inst_alu;
        self.inst_system += other.inst_system;
        self.stalls_mem += other.stalls_mem;
        self.icache_hits += other.icache_hits;
        self.icache_misses += other.icache_misses;
        self.dcache_hits += other.dcache_hits;
        self.dcache_misses += other.dcache_misses;
        self.l2_hits += other.l2_hits;
        self.l2_misses += other.l2_misses;
    }

    /// Cycles per retired instruction, or 0 when nothing retired.
    pub fn cpi(&self) -> f64 {
        if self.instructions_retired == 0 {
            0.0
        } else {
            self.cycles as f64 / self.instructions_retired as f64
        }
    }

    /// Emits the statistics as `info!` events, one section per line group.
    pub fn log(&self) {
        let miss_rate = |hits: u64, misses: u64| {
            let total = hits + misses;
            if total == 0 {
                0.0
            } else {
                (misses as f64 / total as f64) * 100.0
            }
        };

        tracing::info!(
            cycles = self.cycles,
            instructions = self.instructions_retired,
            cpi = %format!("{:.4}", self.cpi()),
            stalls_mem = self.stalls_mem,
            "sim summary"
        );
        tracing::info!(
            alu = self.inst_alu,
            load = self.inst_load,
            store = self.inst_store,
            branch = self.inst_branch,
            system = self.inst_system,
            "instruction mix"
        );
        for (name, hits, misses) in [
            ("L1-I", self.icache_hits, self.icache_misses),
            ("L1-D", self.dcache_hits, self.dcache_misses),
            ("L2", self.l2_hits, self.l2_misses),
        ] {
            tracing::info!(
                "{:<6} accesses: {:<10} | hits: {:<10} | miss_rate: {:.2}%",
                name,
                hits + misses,
                hits,
                miss_rate(hits, misses)
            );
        }
    }
}
