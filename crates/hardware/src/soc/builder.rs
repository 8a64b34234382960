//! System construction and the top-level `System` type.
//!
//! This module builds the memory side of the simulated machine from configuration:
//! 1. **RAM:** Maps `memory.ram_size` bytes at `system.ram_base`.
//! 2. **Memory controller:** Selects the simple or DRAM controller from `memory.controller`.
//! 3. **Bus timing:** Keeps bus width and latency for transit-time calculation on misses.

use crate::config::{Config, MemoryController as MemControllerType};
use crate::soc::memory::Memory;
use crate::soc::memory::controller::{DramController, MemoryController, SimpleController};

/// Memory system attached to the core: RAM, its controller, and the bus between them.
pub struct System {
    /// Main memory.
    pub memory: Memory,
    /// Main memory controller.
    pub mem_controller: Box<dyn MemoryController>,
    /// Bus width in bytes (e.g., 8 for 64-bit); used to compute transfer cycles.
    pub bus_width: u64,
    /// Base latency in cycles per bus transaction.
    pub bus_latency: u64,
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("memory", &self.memory)
            .field("bus_width", &self.bus_width)
            .field("bus_latency", &self.bus_latency)
            .finish_non_exhaustive()
    }
}

impl System {
    /// Builds a new system from configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Session configuration (system and memory sections).
    pub fn new(config: &Config) -> Self {
        let mem_controller: Box<dyn MemoryController> = match config.memory.controller {
            MemControllerType::Dram => Box::new(DramController::new(
                config.memory.t_cas,
                config.memory.t_ras,
                config.memory.t_pre,
            )),
            MemControllerType::Simple => {
                Box::new(SimpleController::new(config.memory.row_miss_latency))
            }
        };

        Self {
            memory: Memory::new(config.system.ram_base, config.memory.ram_size),
            mem_controller,
            bus_width: config.system.bus_width.max(1),
            bus_latency: config.system.bus_latency,
        }
    }

    /// Returns the number of cycles to move `bytes` across the bus.
    ///
    /// Cycles = base latency plus ceiling(bytes / bus_width) transfers.
    pub fn transit_time(&self, bytes: usize) -> u64 {
        self.bus_latency + (bytes as u64).div_ceil(self.bus_width)
    }

    /// Cycles for a line fill from DRAM: controller latency plus bus transit.
    pub fn dram_fill_latency(&mut self, addr: u64, bytes: usize) -> u64 {
        self.mem_controller.access_latency(addr) + self.transit_time(bytes)
    }
}
