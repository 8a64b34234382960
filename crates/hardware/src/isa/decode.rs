//! RISC-V Instruction Decoder.
//!
//! Turns a 32-bit encoding into a [`Decoded`] record. The immediate of each format is
//! reassembled from its scattered bit ranges and sign-extended from its top bit:
//!
//! | format | immediate bits                                  | width |
//! |--------|-------------------------------------------------|-------|
//! | I      | `inst[31:20]`                                   | 12    |
//! | S      | `inst[31:25] : inst[11:7]`                      | 12    |
//! | B      | `inst[31] : inst[7] : inst[30:25] : inst[11:8] : 0` | 13 |
//! | U      | `inst[31:12] : 0{12}`                           | 32    |
//! | J      | `inst[31] : inst[19:12] : inst[20] : inst[30:21] : 0` | 21 |

use crate::isa::instruction::{Decoded, InstructionBits};
use crate::isa::rv64i::opcodes;

/// Extracts `inst[hi:lo]` right-aligned.
#[inline(always)]
const fn field(inst: u32, hi: u32, lo: u32) -> u32 {
    (inst >> lo) & ((1 << (hi - lo + 1)) - 1)
}

/// Sign-extends the low `bits` of `val` to 64 bits.
#[inline(always)]
const fn sign_extend(val: u32, bits: u32) -> i64 {
    let shift = 32 - bits;
    (((val << shift) as i32) >> shift) as i64
}

/// Decodes a RISC-V instruction into its component fields.
///
/// # Arguments
///
/// * `inst` - The 32-bit instruction encoding to decode
///
/// # Returns
///
/// A `Decoded` structure; unknown opcodes decode with a zero immediate and are rejected
/// by the executor.
pub fn decode(inst: u32) -> Decoded {
    let opcode = inst.opcode();

    let imm = match opcode {
        opcodes::OP_IMM | opcodes::OP_IMM_32 | opcodes::OP_LOAD | opcodes::OP_JALR => {
            sign_extend(field(inst, 31, 20), 12)
        }
        opcodes::OP_STORE => sign_extend((field(inst, 31, 25) << 5) | field(inst, 11, 7), 12),
        opcodes::OP_BRANCH => sign_extend(
            (field(inst, 31, 31) << 12)
                | (field(inst, 7, 7) << 11)
                | (field(inst, 30, 25) << 5)
                | (field(inst, 11, 8) << 1),
            13,
        ),
        opcodes::OP_LUI | opcodes::OP_AUIPC => sign_extend(inst & 0xFFFF_F000, 32),
        opcodes::OP_JAL => sign_extend(
            (field(inst, 31, 31) << 20)
                | (field(inst, 19, 12) << 12)
                | (field(inst, 20, 20) << 11)
                | (field(inst, 30, 21) << 1),
            21,
        ),
        _ => 0,
    };

    Decoded {
        raw: inst,
        opcode,
        rd: inst.rd(),
        rs1: inst.rs1(),
        rs2: inst.rs2(),
        funct3: inst.funct3(),
        funct7: inst.funct7(),
        imm,
    }
}
