//! Global System Constants.
//!
//! This module defines system-wide constants used across the simulator. It includes:
//! 1. **Memory Constants:** Page sizes and shifts used by dirty-page tracking.
//! 2. **Instruction Constants:** Instruction width and the canonical `nop` encoding.
//! 3. **Trial Constants:** The syscall numbers that mark the end of a trial.

/// Page size in bytes (4KB).
pub const PAGE_SIZE: u64 = 4096;

/// Number of bits to shift to convert between bytes and pages.
pub const PAGE_SHIFT: u64 = 12;

/// Size of a standard (32-bit) RISC-V instruction in bytes.
pub const INSTRUCTION_SIZE_32: u64 = 4;

/// Canonical RISC-V `nop` (`addi x0, x0, 0`).
///
/// Unused bytes of the test-case code region are filled with this encoding.
pub const NOP_INSTRUCTION: u32 = 0x0000_0013;

/// Linux `exit` syscall number; an `ecall` with this in `a7` ends the trial normally.
pub const SYSCALL_EXIT: u64 = 93;

/// Linux `exit_group` syscall number; treated the same as [`SYSCALL_EXIT`].
pub const SYSCALL_EXIT_GROUP: u64 = 94;

/// Stack pointer alignment required by the RISC-V psABI.
pub const STACK_ALIGN: u64 = 16;

/// Multi-cycle latency charged for `MUL*` instructions.
pub const MUL_LATENCY: u64 = 3;

/// Multi-cycle latency charged for `DIV*`/`REM*` instructions.
pub const DIV_LATENCY: u64 = 20;
