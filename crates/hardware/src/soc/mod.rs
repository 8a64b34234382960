//! System-on-Chip (SoC) Components.
//!
//! The memory side of the simulated machine: RAM with dirty-page tracking, the memory
//! controller timing model, and the builder that assembles them from configuration.

/// System builder for assembling SoC components.
pub mod builder;

/// Main memory and memory controller implementations.
pub mod memory;

pub use builder::System;
