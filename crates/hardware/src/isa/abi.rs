//! RISC-V ABI register indices.
//!
//! Only the registers the engine itself touches are named: the stack pointer set at bind
//! time and the argument registers that carry the exit syscall.

/// Register x0 (zero register, always zero).
pub const REG_ZERO: usize = 0;
/// Register x1 (return address, ra).
pub const REG_RA: usize = 1;
/// Register x2 (stack pointer, sp).
pub const REG_SP: usize = 2;
/// Register x10 (first argument/return value, a0). Carries the exit code.
pub const REG_A0: usize = 10;
/// Register x17 (system call number, a7).
pub const REG_A7: usize = 17;
