//! Simulation host and workload loading.
//!
//! Provides the `Simulator`, which advances the core by bounded quanta, and the
//! `WorkloadLoader`, which binds executable images to it between trials.

/// Executable image parsing and process binding.
pub mod loader;

/// Quantum-based execution of the bound workload.
pub mod simulator;

pub use self::loader::{Image, LoadError, ProcessHandle, WorkloadLoader, WorkloadSymbols};
pub use self::simulator::{RunOutcome, Simulator};
