//! CPU Core Definition and Initialization.
//!
//! This module defines the central `Cpu` structure, the container for the entire processor
//! state. It coordinates the following:
//! 1. **State Management:** Registers, program counter, and the core run state.
//! 2. **Memory Hierarchy:** L1-I, L1-D, and unified L2 cache models in front of RAM.
//! 3. **Trial Boundaries:** Halting on the exit syscall, on a trap, or on budget exhaustion,
//!    and re-arming for a freshly bound workload.

/// Integer ALU and multiply/divide unit.
pub mod alu;

/// Instruction execution.
pub mod execution;

/// Memory access handling through the cache hierarchy.
pub mod memory;

use std::fmt;

use crate::common::{RegisterFile, Trap};
use crate::config::Config;
use crate::core::units::cache::CacheSim;
use crate::inspect::CacheLevel;
use crate::isa::abi;
use crate::soc::System;
use crate::stats::SimStats;

/// Why a core stopped executing its workload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HaltReason {
    /// The workload issued the exit syscall; carries the exit code from `a0`.
    Exit(u64),
    /// The workload raised an architectural trap.
    Trap(Trap),
    /// The workload retired the configured instruction budget without exiting.
    BudgetExhausted,
}

impl HaltReason {
    /// Returns `true` for the normal end-of-trial marker.
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit(_))
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit(code) => write!(f, "exit({code})"),
            Self::Trap(trap) => write!(f, "trap {trap}"),
            Self::BudgetExhausted => f.write_str("instruction budget exhausted"),
        }
    }
}

/// Run state of the core.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CoreState {
    /// No workload is bound.
    #[default]
    Idle,
    /// A workload is bound and executing.
    Active,
    /// The bound workload has stopped.
    Halted(HaltReason),
}

/// Main CPU structure containing all processor state and components.
pub struct Cpu {
    /// General Purpose Registers.
    pub regs: RegisterFile,
    /// Program Counter.
    pub pc: u64,
    /// Run state.
    pub state: CoreState,
    /// RAM, memory controller, and bus timing.
    pub system: System,
    /// L1 Instruction Cache.
    pub l1_i_cache: CacheSim,
    /// L1 Data Cache.
    pub l1_d_cache: CacheSim,
    /// L2 Unified Cache.
    pub l2_cache: CacheSim,
    /// Per-trial performance statistics.
    pub stats: SimStats,
    /// Emit a `trace!` event per retired instruction.
    pub trace: bool,
    /// Retired instructions after which the workload is stopped.
    pub instruction_budget: u64,
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &format_args!("{:#x}", self.pc))
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Cpu {
    /// Creates an idle CPU attached to `system`.
    ///
    /// # Arguments
    ///
    /// * `system` - RAM and memory controller.
    /// * `config` - Cache topology, tracing, and instruction budget.
    pub fn new(system: System, config: &Config) -> Self {
        Self {
            regs: RegisterFile::new(),
            pc: config.system.ram_base,
            state: CoreState::Idle,
            system,
            l1_i_cache: CacheSim::new(CacheLevel::L1I, &config.cache.l1_i),
            l1_d_cache: CacheSim::new(CacheLevel::L1D, &config.cache.l1_d),
            l2_cache: CacheSim::new(CacheLevel::L2, &config.cache.l2),
            stats: SimStats::default(),
            trace: config.general.trace_instructions || cfg!(feature = "always-trace"),
            instruction_budget: config.general.instruction_budget,
        }
    }

    /// Returns `true` while a bound workload is executing.
    pub fn is_active(&self) -> bool {
        self.state == CoreState::Active
    }

    /// Returns the halt reason if the bound workload has stopped.
    pub fn halt_reason(&self) -> Option<&HaltReason> {
        match &self.state {
            CoreState::Halted(reason) => Some(reason),
            _ => None,
        }
    }

    /// Stops the workload.
    pub fn halt(&mut self, reason: HaltReason) {
        tracing::debug!(pc = %format!("{:#x}", self.pc), %reason, "core halted");
        self.state = CoreState::Halted(reason);
    }

    /// Drops the bound workload: clears registers and statistics, core becomes `Idle`.
    ///
    /// Caches are left untouched.
    pub fn detach(&mut self) {
        self.regs.clear();
        self.stats = SimStats::default();
        self.state = CoreState::Idle;
    }

    /// Arms the core for a freshly loaded workload.
    ///
    /// # Arguments
    ///
    /// * `entry` - Initial program counter.
    /// * `sp` - Initial stack pointer.
    pub fn start(&mut self, entry: u64, sp: u64) {
        self.regs.clear();
        self.regs.write(abi::REG_SP, sp);
        self.pc = entry;
        self.stats = SimStats::default();
        self.system.mem_controller.reset();
        self.state = CoreState::Active;
    }

    /// Dumps the current CPU state (PC and registers) at `debug` level.
    pub fn dump_state(&self) {
        tracing::debug!("PC = {:#018x}", self.pc);
        self.regs.dump();
    }
}
