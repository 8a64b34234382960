//! Simulator: owns the CPU and advances it in bounded quanta.
//!
//! Simulated time only moves inside `run`. Everything the trial controller does between
//! quanta (inspection, reset, rebinding) happens with the core stopped.

use crate::config::Config;
use crate::core::{CoreState, Cpu, HaltReason};
use crate::soc::System;

/// Why a call to [`Simulator::run`] returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The workload stopped during (or before) this quantum.
    Halted(HaltReason),
    /// The quantum was used up and the workload is still running.
    QuantumExpired,
    /// No workload is bound.
    Idle,
}

/// Top-level simulator: the core together with its caches and memory system.
#[derive(Debug)]
pub struct Simulator {
    /// CPU state (registers, caches, memory system, stats).
    pub cpu: Cpu,
}

impl Simulator {
    /// Creates a new simulator with the given system and configuration.
    pub fn new(system: System, config: &Config) -> Self {
        Self {
            cpu: Cpu::new(system, config),
        }
    }

    /// Builds the system from `config` and wraps a fresh core around it.
    pub fn from_config(config: &Config) -> Self {
        Self::new(System::new(config), config)
    }

    /// Executes at most `max_instructions` instructions of the bound workload.
    ///
    /// # Returns
    ///
    /// How the quantum ended. Calling `run` on a halted core reports the same halt reason
    /// again without executing anything.
    pub fn run(&mut self, max_instructions: u64) -> RunOutcome {
        let mut executed = 0;
        while executed < max_instructions {
            if !self.cpu.step() {
                break;
            }
            executed += 1;
        }

        match &self.cpu.state {
            CoreState::Idle => RunOutcome::Idle,
            CoreState::Active => RunOutcome::QuantumExpired,
            CoreState::Halted(reason) => RunOutcome::Halted(reason.clone()),
        }
    }

    /// Simulated cycles consumed by the bound workload so far.
    pub fn cycles(&self) -> u64 {
        self.cpu.stats.cycles
    }
}
