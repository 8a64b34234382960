//! Memory Access Types.
//!
//! This module defines the classification of memory accesses used throughout the simulator.
//! These types are used for the following:
//! 1. **Cache Routing:** Fetches go through L1-I, loads and stores through L1-D.
//! 2. **Fault Generation:** Determining the correct access fault or misaligned trap.
//! 3. **Statistics Tracking:** Categorizing memory operations for per-trial statistics.

use super::error::Trap;

/// Type of memory access operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    /// Instruction fetch access.
    Fetch,

    /// Data read access (load instructions).
    Read,

    /// Data write access (store instructions).
    Write,
}

impl AccessType {
    /// Builds the access-fault trap matching this access type.
    pub fn access_fault(self, addr: u64) -> Trap {
        match self {
            Self::Fetch => Trap::InstructionAccessFault(addr),
            Self::Read => Trap::LoadAccessFault(addr),
            Self::Write => Trap::StoreAccessFault(addr),
        }
    }

    /// Builds the misaligned-address trap matching this access type.
    pub fn misaligned(self, addr: u64) -> Trap {
        match self {
            Self::Fetch => Trap::InstructionAddressMisaligned(addr),
            Self::Read => Trap::LoadAddressMisaligned(addr),
            Self::Write => Trap::StoreAddressMisaligned(addr),
        }
    }
}
