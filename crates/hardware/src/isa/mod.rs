//! Instruction Set Architecture (ISA) Definitions.
//!
//! Contains opcodes, function codes, and decoding logic for the subset of RISC-V the
//! trial engine executes, organized by extension.
//!
//! # Extensions
//!
//! * `rv64i`: Base Integer Instruction Set (64-bit).
//! * `rv64m`: Standard Extension for Integer Multiplication and Division.
//! * `privileged`: The `SYSTEM` opcode and the environment-call encodings.
//!
//! Compressed, atomic, and floating-point encodings decode to an illegal instruction.

/// Application Binary Interface (ABI) register indices.
pub mod abi;

/// Field extraction and immediate decoding for the R/I/S/B/U/J formats.
pub mod decode;

/// Instruction encoding structures and bit extraction utilities.
pub mod instruction;

/// System instruction encodings.
pub mod privileged;

/// Base integer instruction set (64-bit RISC-V core instructions).
pub mod rv64i;

/// Integer multiply/divide extension (MUL, DIV, REM instructions).
pub mod rv64m;

pub use decode::decode;
pub use instruction::{Decoded, InstructionBits};
