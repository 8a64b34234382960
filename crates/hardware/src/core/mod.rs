//! Core processor implementation.
//!
//! This module contains the in-order RV64IM core and the functional units of its memory
//! hierarchy (caches and prefetchers).

/// CPU core implementation and execution.
pub mod cpu;

/// Functional units (cache models, prefetchers).
pub mod units;

pub use self::cpu::{CoreState, Cpu, HaltReason};
