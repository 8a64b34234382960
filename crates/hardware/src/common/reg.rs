//! Integer Register File.
//!
//! This module provides the `RegisterFile` struct holding the 32 RV64 general-purpose
//! registers. It provides:
//! 1. **Storage:** Maintains the integer registers `x0`-`x31`.
//! 2. **Invariant Enforcement:** Ensures that register `x0` is hardwired to zero.
//! 3. **Observability:** Debugging utilities for dumping register state through `tracing`.

/// General-purpose register file.
///
/// Register `x0` is hardwired to zero; writes to it are discarded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u64; 32],
}

impl RegisterFile {
    /// Creates a new register file with all registers initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a value from a general-purpose register.
    ///
    /// # Arguments
    ///
    /// * `idx` - Register index (0-31). Register `x0` always returns 0.
    pub fn read(&self, idx: usize) -> u64 {
        if idx == 0 { 0 } else { self.regs[idx & 0x1F] }
    }

    /// Writes a value to a general-purpose register.
    ///
    /// # Arguments
    ///
    /// * `idx` - Register index (0-31). Writes to `x0` are ignored.
    /// * `val` - The 64-bit value to write.
    pub fn write(&mut self, idx: usize, val: u64) {
        if idx != 0 {
            self.regs[idx & 0x1F] = val;
        }
    }

    /// Zeroes every register.
    pub fn clear(&mut self) {
        self.regs = [0; 32];
    }

    /// Dumps the contents of all registers at `debug` level.
    pub fn dump(&self) {
        for i in (0..32).step_by(2) {
            tracing::debug!(
                "x{:<2}={:#018x} x{:<2}={:#018x}",
                i,
                self.regs[i],
                i + 1,
                self.regs[i + 1]
            );
        }
    }
}
