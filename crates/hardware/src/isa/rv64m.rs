//! RISC-V Multiply/Divide Extension (M).
//!
//! M instructions share `OP_REG`/`OP_REG_32` with the base set and are selected by
//! `funct7 == M_EXTENSION`; `funct3` then picks the operation.

/// `funct7` value selecting the M extension.
pub const M_EXTENSION: u32 = 0b000_0001;

/// Multiply, low 64 bits.
pub const MUL: u32 = 0b000;
/// Multiply High (signed * signed).
pub const MULH: u32 = 0b001;
/// Multiply High (signed * unsigned).
pub const MULHSU: u32 = 0b010;
/// Multiply High (unsigned * unsigned).
pub const MULHU: u32 = 0b011;
/// Divide (signed).
pub const DIV: u32 = 0b100;
/// Divide Unsigned.
pub const DIVU: u32 = 0b101;
/// Remainder (signed).
pub const REM: u32 = 0b110;
/// Remainder Unsigned.
pub const REMU: u32 = 0b111;
