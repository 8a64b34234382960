//! Trap definitions.
//!
//! This module defines the architectural exceptions a trial workload can raise. It provides:
//! 1. **Trap Representation:** The synchronous exceptions an RV64 user-mode program can take.
//! 2. **Cause Codes:** The `mcause` encoding of each trap, reported to the fuzzer as fault detail.
//! 3. **Error Handling:** Integrating with standard Rust error traits for system-level reporting.
//!
//! A trap never propagates past the core: it halts the workload and the trial controller folds
//! it into the trial result as a fault.

use std::fmt;

/// RISC-V trap types raised by a running workload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trap {
    /// Instruction address misaligned exception.
    ///
    /// The associated value is the misaligned program counter.
    InstructionAddressMisaligned(u64),

    /// Instruction access fault exception.
    ///
    /// Raised when an instruction fetch targets memory outside simulated RAM.
    /// The associated value is the faulting address.
    InstructionAccessFault(u64),

    /// Illegal instruction exception.
    ///
    /// Raised when an instruction encoding is invalid or not implemented.
    /// The associated value is the instruction encoding.
    IllegalInstruction(u32),

    /// Breakpoint exception (`EBREAK`). The associated value is the program counter.
    Breakpoint(u64),

    /// Load address misaligned exception.
    LoadAddressMisaligned(u64),

    /// Load access fault exception.
    ///
    /// Raised when a load targets memory outside simulated RAM.
    LoadAccessFault(u64),

    /// Store address misaligned exception.
    StoreAddressMisaligned(u64),

    /// Store access fault exception.
    StoreAccessFault(u64),

    /// Environment call from user mode that is not a recognised exit.
    ///
    /// The associated value is the syscall number found in `a7`.
    EnvironmentCallFromUMode(u64),
}

impl Trap {
    /// Returns the `mcause` exception code for this trap.
    pub fn cause(&self) -> u64 {
        match self {
            Self::InstructionAddressMisaligned(_) => 0,
            Self::InstructionAccessFault(_) => 1,
            Self::IllegalInstruction(_) => 2,
            Self::Breakpoint(_) => 3,
            Self::LoadAddressMisaligned(_) => 4,
            Self::LoadAccessFault(_) => 5,
            Self::StoreAddressMisaligned(_) => 6,
            Self::StoreAccessFault(_) => 7,
            Self::EnvironmentCallFromUMode(_) => 8,
        }
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstructionAddressMisaligned(addr) => {
                write!(f, "InstructionAddressMisaligned({addr:#x})")
            }
            Self::InstructionAccessFault(addr) => write!(f, "InstructionAccessFault({addr:#x})"),
            Self::IllegalInstruction(inst) => write!(f, "IllegalInstruction({inst:#x})"),
            Self::Breakpoint(pc) => write!(f, "Breakpoint({pc:#x})"),
            Self::LoadAddressMisaligned(addr) => write!(f, "LoadAddressMisaligned({addr:#x})"),
            Self::LoadAccessFault(addr) => write!(f, "LoadAccessFault({addr:#x})"),
            Self::StoreAddressMisaligned(addr) => write!(f, "StoreAddressMisaligned({addr:#x})"),
            Self::StoreAccessFault(addr) => write!(f, "StoreAccessFault({addr:#x})"),
            Self::EnvironmentCallFromUMode(num) => write!(f, "EnvironmentCallFromUMode({num})"),
        }
    }
}

impl std::error::Error for Trap {}
