//! RISC-V Base Integer Instruction Set (I).
//!
//! - `opcodes`: Major opcodes (bits 6-0).
//! - `funct3`: Minor opcodes distinguishing instructions within a major opcode.
//! - `funct7`: Additional opcode bits for R-type instructions and shifts.

/// Base integer instruction set opcodes.
pub mod opcodes {
    /// Loads (LB, LH, LW, LD, LBU, LHU, LWU).
    pub const OP_LOAD: u32 = 0b000_0011;
    /// Memory ordering (FENCE, FENCE.I).
    pub const OP_MISC_MEM: u32 = 0b000_1111;
    /// Immediate arithmetic (ADDI, SLTI, SLLI, ...).
    pub const OP_IMM: u32 = 0b001_0011;
    /// Add Upper Immediate to PC.
    pub const OP_AUIPC: u32 = 0b001_0111;
    /// 32-bit immediate arithmetic (ADDIW, SLLIW, SRLIW, SRAIW).
    pub const OP_IMM_32: u32 = 0b001_1011;
    /// Stores (SB, SH, SW, SD).
    pub const OP_STORE: u32 = 0b010_0011;
    /// Register-register arithmetic, shared with the M extension.
    pub const OP_REG: u32 = 0b011_0011;
    /// Load Upper Immediate.
    pub const OP_LUI: u32 = 0b011_0111;
    /// 32-bit register-register arithmetic, shared with the M extension.
    pub const OP_REG_32: u32 = 0b011_1011;
    /// Conditional branches.
    pub const OP_BRANCH: u32 = 0b110_0011;
    /// Jump and Link Register.
    pub const OP_JALR: u32 = 0b110_0111;
    /// Jump and Link.
    pub const OP_JAL: u32 = 0b110_1111;
}

/// Function code 3 definitions for base integer operations.
pub mod funct3 {
    /// Load Byte (signed).
    pub const LB: u32 = 0b000;
    /// Load Halfword (signed).
    pub const LH: u32 = 0b001;
    /// Load Word (signed).
    pub const LW: u32 = 0b010;
    /// Load Doubleword.
    pub const LD: u32 = 0b011;
    /// Load Byte Unsigned.
    pub const LBU: u32 = 0b100;
    /// Load Halfword Unsigned.
    pub const LHU: u32 = 0b101;
    /// Load Word Unsigned.
    pub const LWU: u32 = 0b110;

    /// Store Byte.
    pub const SB: u32 = 0b000;
    /// Store Halfword.
    pub const SH: u32 = 0b001;
    /// Store Word.
    pub const SW: u32 = 0b010;
    /// Store Doubleword.
    pub const SD: u32 = 0b011;

    /// Branch Equal.
    pub const BEQ: u32 = 0b000;
    /// Branch Not Equal.
    pub const BNE: u32 = 0b001;
    /// Branch Less Than (signed).
    pub const BLT: u32 = 0b100;
    /// Branch Greater or Equal (signed).
    pub const BGE: u32 = 0b101;
    /// Branch Less Than Unsigned.
    pub const BLTU: u32 = 0b110;
    /// Branch Greater or Equal Unsigned.
    pub const BGEU: u32 = 0b111;

    /// Add / Subtract.
    pub const ADD_SUB: u32 = 0b000;
    /// Shift Left Logical.
    pub const SLL: u32 = 0b001;
    /// Set Less Than (signed).
    pub const SLT: u32 = 0b010;
    /// Set Less Than Unsigned.
    pub const SLTU: u32 = 0b011;
    /// Bitwise XOR.
    pub const XOR: u32 = 0b100;
    /// Shift Right Logical / Arithmetic.
    pub const SRL_SRA: u32 = 0b101;
    /// Bitwise OR.
    pub const OR: u32 = 0b110;
    /// Bitwise AND.
    pub const AND: u32 = 0b111;
}

/// Function code 7 definitions for base integer operations.
pub mod funct7 {
    /// Default operation (ADD, SRL, ...).
    pub const DEFAULT: u32 = 0b000_0000;
    /// Alternate operation (SUB, SRA).
    pub const ALT: u32 = 0b010_0000;
}
