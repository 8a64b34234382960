//! Integer ALU operations.
//!
//! Implements the RV64I register/immediate arithmetic and the M-extension multiply/divide
//! family, in both 64-bit and 32-bit word (`W`) variants. All 32-bit results are
//! sign-extended from bit 31 to 64 bits.

use crate::isa::rv64i::{funct3, funct7};
use crate::isa::rv64m;

#[inline(always)]
fn sext32(val: u64) -> u64 {
    val as i32 as i64 as u64
}

/// Executes a base integer operation selected by `funct3`.
///
/// # Arguments
///
/// * `f3` - The `funct3` field.
/// * `alt` - The alternate-encoding bit (SUB instead of ADD, SRA instead of SRL).
/// * `a` - First operand.
/// * `b` - Second operand (register value or immediate).
/// * `is32` - If true, perform the 32-bit (W-suffix) variant.
pub fn integer(f3: u32, alt: bool, a: u64, b: u64, is32: bool) -> u64 {
    if is32 {
        let shamt = (b & 0x1F) as u32;
        let res = match f3 {
            funct3::ADD_SUB if alt => (a as u32).wrapping_sub(b as u32),
            funct3::ADD_SUB => (a as u32).wrapping_add(b as u32),
            funct3::SLL => (a as u32) << shamt,
            funct3::SRL_SRA if alt => ((a as i32) >> shamt) as u32,
            funct3::SRL_SRA => (a as u32) >> shamt,
            _ => 0,
        };
        return sext32(u64::from(res));
    }

    let shamt = (b & 0x3F) as u32;
    match f3 {
        funct3::ADD_SUB if alt => a.wrapping_sub(b),
        funct3::ADD_SUB => a.wrapping_add(b),
        funct3::SLL => a << shamt,
        funct3::SLT => u64::from((a as i64) < (b as i64)),
        funct3::SLTU => u64::from(a < b),
        funct3::XOR => a ^ b,
        funct3::SRL_SRA if alt => ((a as i64) >> shamt) as u64,
        funct3::SRL_SRA => a >> shamt,
        funct3::OR => a | b,
        funct3::AND => a & b,
        _ => 0,
    }
}

/// Returns `true` when `f7` selects the alternate encoding for `f3`.
pub fn is_alt(f3: u32, f7: u32) -> bool {
    matches!(f3, funct3::ADD_SUB | funct3::SRL_SRA) && f7 & funct7::ALT != 0
}

/// Executes an M-extension operation selected by `funct3`.
///
/// Division by zero and signed overflow follow the architectural results: quotient all
/// ones or the dividend, remainder the dividend or zero.
pub fn muldiv(f3: u32, a: u64, b: u64, is32: bool) -> u64 {
    if is32 {
        let (x, y) = (a as i32, b as i32);
        let (ux, uy) = (a as u32, b as u32);
        let res = match f3 {
            rv64m::MUL => x.wrapping_mul(y) as u32,
            rv64m::DIV if y == 0 => u32::MAX,
            rv64m::DIV => x.wrapping_div(y) as u32,
            rv64m::DIVU if uy == 0 => u32::MAX,
            rv64m::DIVU => ux / uy,
            rv64m::REM if y == 0 => ux,
            rv64m::REM => x.wrapping_rem(y) as u32,
            rv64m::REMU if uy == 0 => ux,
            rv64m::REMU => ux % uy,
            _ => 0,
        };
        return sext32(u64::from(res));
    }

    match f3 {
        rv64m::MUL => a.wrapping_mul(b),
        rv64m::MULH => ((i128::from(a as i64) * i128::from(b as i64)) >> 64) as u64,
        rv64m::MULHSU => ((i128::from(a as i64) * (b as i128)) >> 64) as u64,
        rv64m::MULHU => ((u128::from(a) * u128::from(b)) >> 64) as u64,
        rv64m::DIV if b == 0 => u64::MAX,
        rv64m::DIV => (a as i64).wrapping_div(b as i64) as u64,
        rv64m::DIVU if b == 0 => u64::MAX,
        rv64m::DIVU => a / b,
        rv64m::REM if b == 0 => a,
        rv64m::REM => (a as i64).wrapping_rem(b as i64) as u64,
        rv64m::REMU if b == 0 => a,
        rv64m::REMU => a % b,
        _ => 0,
    }
}

/// Returns `true` for the multi-cycle divide/remainder operations.
pub fn is_divide(f3: u32) -> bool {
    f3 >= rv64m::DIV
}
