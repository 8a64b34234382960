//! RISC-V trial executor library.
//!
//! This crate runs fuzzer-generated RISC-V programs on a cycle-approximate core and reports the
//! cache state they leave behind. It provides:
//! 1. **Core:** An in-order RV64IM core with L1-I, L1-D, and unified L2 cache models in front of
//!    a DRAM-timed memory.
//! 2. **Inspection:** Out-of-band reading and resetting of cache line state.
//! 3. **Workloads:** ELF loading and per-trial rebinding of the process image.
//! 4. **Trials:** The trial controller state machine and the framed protocol spoken with the
//!    fuzzer over a named Unix socket.
//! 5. **Driver:** The campaign loop tying simulation quanta to controller steps.

/// Common types and constants (registers, traps, access types).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// CPU core (execution, memory access, caches, prefetchers).
pub mod core;
/// Campaign loop.
pub mod driver;
/// Cache state accessor.
pub mod inspect;
/// Fuzzer channel and wire format.
pub mod ipc;
/// Instruction set (decode, instruction fields, ABI, RV64I/M, privileged encodings).
pub mod isa;
/// Simulation session owning the machine and the bound workload.
pub mod session;
/// Workload loader and quantum-based simulator.
pub mod sim;
/// Memory system (RAM, memory controllers, bus timing).
pub mod soc;
/// Simulation statistics collection and reporting.
pub mod stats;
/// Trial data model and controller.
pub mod trial;

/// Root configuration type; use `Config::default()` or `Config::from_json`.
pub use crate::config::Config;
/// Main CPU type; holds registers, caches, memory system, and stats.
pub use crate::core::Cpu;
/// Campaign loop and its summary.
pub use crate::driver::{CampaignSummary, SimulationDriver};
/// Cache inspection capability.
pub use crate::inspect::{CacheAccessor, CacheInspectable, CacheLevel};
/// Fuzzer channel.
pub use crate::ipc::Channel;
/// Simulator instance behind a channel.
pub use crate::session::{SessionError, SimulationSession};
/// Quantum-based simulator owning the core.
pub use crate::sim::Simulator;
/// Memory system; construct with `System::new`.
pub use crate::soc::System;
/// Trial controller.
pub use crate::trial::TrialController;
