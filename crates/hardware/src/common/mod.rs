//! Common utilities and types used throughout the trial executor.
//!
//! This module provides fundamental building blocks that are shared across the engine and
//! the trial control core. It includes:
//! 1. **Constants:** Page size, instruction encodings, and syscall numbers.
//! 2. **Memory Access:** Definitions for categorizing memory operations (Fetch/Read/Write).
//! 3. **Traps:** Architectural exceptions raised by a running workload.
//! 4. **Register Management:** The integer register file.

/// Common constants used throughout the simulator.
pub mod constants;

/// Memory access type definitions.
pub mod data;

/// Trap definitions.
pub mod error;

/// Register file implementation.
pub mod reg;

pub use constants::{PAGE_SHIFT, PAGE_SIZE};
pub use data::AccessType;
pub use error::Trap;
pub use reg::RegisterFile;
