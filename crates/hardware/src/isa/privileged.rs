//! RISC-V system instruction encodings.
//!
//! The trial engine runs user-mode code only, so of the privileged architecture it needs
//! the `SYSTEM` opcode and the two environment-transfer encodings.

/// System instruction opcode.
pub const OP_SYSTEM: u32 = 0b111_0011;

/// Environment Call (ECALL).
pub const ECALL: u32 = 0x0000_0073;

/// Environment Break (EBREAK).
pub const EBREAK: u32 = 0x0010_0073;
