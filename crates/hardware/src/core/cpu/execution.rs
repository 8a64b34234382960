//! Instruction Execution.
//!
//! This module implements the execution cycle of the core. Each `step` retires exactly one
//! instruction:
//! 1. **Budget:** A workload that has retired its instruction budget is halted first.
//! 2. **Fetch/Decode:** The instruction is fetched through L1-I and decoded.
//! 3. **Execute:** ALU, branch, load/store (through L1-D), and system instructions.
//! 4. **Timing:** One base cycle plus memory penalties and multi-cycle MUL/DIV latency.
//!
//! `ecall` with `a7` holding the `exit`/`exit_group` syscall number is the end-of-trial
//! marker and halts the core normally; any other trap halts it with the trap.

use super::{Cpu, HaltReason};
use crate::common::Trap;
use crate::common::constants::{
    DIV_LATENCY, INSTRUCTION_SIZE_32, MUL_LATENCY, SYSCALL_EXIT, SYSCALL_EXIT_GROUP,
};
use crate::core::cpu::alu;
use crate::isa::instruction::Decoded;
use crate::isa::privileged::{EBREAK, ECALL, OP_SYSTEM};
use crate::isa::rv64i::{funct3, opcodes};
use crate::isa::{abi, decode, rv64m};

/// What a retired instruction asks the core to do next.
enum Flow {
    /// Fall through to `pc + 4`.
    Next,
    /// Continue at the given address.
    Jump(u64),
    /// Stop the workload.
    Halt(HaltReason),
}

impl Cpu {
    /// Executes one instruction of the bound workload.
    ///
    /// Does nothing unless the core is `Active`.
    ///
    /// # Returns
    ///
    /// `true` while the core is still active afterwards.
    pub fn step(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.stats.instructions_retired >= self.instruction_budget {
            self.halt(HaltReason::BudgetExhausted);
            return false;
        }

        let pc = self.pc;
        match self.execute_one(pc) {
            Ok(Flow::Next) => self.pc = pc.wrapping_add(INSTRUCTION_SIZE_32),
            Ok(Flow::Jump(target)) => self.pc = target,
            Ok(Flow::Halt(reason)) => {
                self.halt(reason);
                return false;
            }
            Err(trap) => {
                self.halt(HaltReason::Trap(trap));
                return false;
            }
        }
        true
    }

    fn execute_one(&mut self, pc: u64) -> Result<Flow, Trap> {
        let (raw, fetch_penalty) = self.fetch(pc)?;
        let d = decode(raw);
        let mut cycles = 1 + fetch_penalty;

        if self.trace {
            tracing::trace!("{:#010x}: {:08x}", pc, raw);
        }

        let rs1 = self.regs.read(d.rs1);
        let rs2 = self.regs.read(d.rs2);

        let flow = match d.opcode {
            opcodes::OP_LUI => {
                self.regs.write(d.rd, d.imm as u64);
                self.stats.inst_alu += 1;
                Flow::Next
            }
            opcodes::OP_AUIPC => {
                self.regs.write(d.rd, pc.wrapping_add(d.imm as u64));
                self.stats.inst_alu += 1;
                Flow::Next
            }
            opcodes::OP_JAL => {
                self.stats.inst_branch += 1;
                self.jump(pc, d.rd, pc.wrapping_add(d.imm as u64))?
            }
            opcodes::OP_JALR => {
                self.stats.inst_branch += 1;
                self.jump(pc, d.rd, rs1.wrapping_add(d.imm as u64) & !1)?
            }
            opcodes::OP_BRANCH => {
                self.stats.inst_branch += 1;
                let taken = match d.funct3 {
                    funct3::BEQ => rs1 == rs2,
                    funct3::BNE => rs1 != rs2,
                    funct3::BLT => (rs1 as i64) < (rs2 as i64),
                    funct3::BGE => (rs1 as i64) >= (rs2 as i64),
                    funct3::BLTU => rs1 < rs2,
                    funct3::BGEU => rs1 >= rs2,
                    _ => return Err(Trap::IllegalInstruction(raw)),
                };
                if taken {
                    self.jump(pc, 0, pc.wrapping_add(d.imm as u64))?
                } else {
                    Flow::Next
                }
            }
            opcodes::OP_LOAD => {
                let (size, signed) = match d.funct3 {
                    funct3::LB => (1, true),
                    funct3::LH => (2, true),
                    funct3::LW => (4, true),
                    funct3::LD => (8, false),
                    funct3::LBU => (1, false),
                    funct3::LHU => (2, false),
                    funct3::LWU => (4, false),
                    _ => return Err(Trap::IllegalInstruction(raw)),
                };
                let addr = rs1.wrapping_add(d.imm as u64);
                let (val, penalty) = self.load(addr, size)?;
                cycles += penalty;
                self.stats.stalls_mem += penalty;
                self.stats.inst_load += 1;
                self.regs.write(d.rd, if signed { sign_extend(val, size) } else { val });
                Flow::Next
            }
            opcodes::OP_STORE => {
                let size = match d.funct3 {
                    funct3::SB => 1,
                    funct3::SH => 2,
                    funct3::SW => 4,
                    funct3::SD => 8,
                    _ => return Err(Trap::IllegalInstruction(raw)),
                };
                let addr = rs1.wrapping_add(d.imm as u64);
                let penalty = self.store(addr, size, rs2)?;
                cycles += penalty;
                self.stats.stalls_mem += penalty;
                self.stats.inst_store += 1;
                Flow::Next
            }
            opcodes::OP_IMM | opcodes::OP_IMM_32 => {
                let is32 = d.opcode == opcodes::OP_IMM_32;
                self.check_imm(&d, is32)?;
                let alt = d.funct3 == funct3::SRL_SRA && (d.imm >> 10) & 1 == 1;
                let b = if d.funct3 == funct3::SLL || d.funct3 == funct3::SRL_SRA {
                    (d.imm as u64) & 0x3F
                } else {
                    d.imm as u64
                };
                self.regs.write(d.rd, alu::integer(d.funct3, alt, rs1, b, is32));
                self.stats.inst_alu += 1;
                Flow::Next
            }
            opcodes::OP_REG | opcodes::OP_REG_32 => {
                let is32 = d.opcode == opcodes::OP_REG_32;
                let val = if d.funct7 == rv64m::M_EXTENSION {
                    if is32 && matches!(d.funct3, rv64m::MULH | rv64m::MULHSU | rv64m::MULHU) {
                        return Err(Trap::IllegalInstruction(raw));
                    }
                    cycles += if alu::is_divide(d.funct3) {
                        DIV_LATENCY
                    } else {
                        MUL_LATENCY
                    };
                    alu::muldiv(d.funct3, rs1, rs2, is32)
                } else {
                    let alt = alu::is_alt(d.funct3, d.funct7);
                    let legal = d.funct7 == 0 || alt;
                    let legal_w = !is32
                        || matches!(d.funct3, funct3::ADD_SUB | funct3::SLL | funct3::SRL_SRA);
                    if !legal || !legal_w {
                        return Err(Trap::IllegalInstruction(raw));
                    }
                    alu::integer(d.funct3, alt, rs1, rs2, is32)
                };
                self.regs.write(d.rd, val);
                self.stats.inst_alu += 1;
                Flow::Next
            }
            opcodes::OP_MISC_MEM => {
                self.stats.inst_system += 1;
                Flow::Next
            }
            OP_SYSTEM => {
                self.stats.inst_system += 1;
                match raw {
                    ECALL => {
                        let num = self.regs.read(abi::REG_A7);
                        if num == SYSCALL_EXIT || num == SYSCALL_EXIT_GROUP {
                            Flow::Halt(HaltReason::Exit(self.regs.read(abi::REG_A0)))
                        } else {
                            return Err(Trap::EnvironmentCallFromUMode(num));
                        }
                    }
                    EBREAK => return Err(Trap::Breakpoint(pc)),
                    _ => return Err(Trap::IllegalInstruction(raw)),
                }
            }
            _ => return Err(Trap::IllegalInstruction(raw)),
        };

        self.stats.cycles += cycles;
        self.stats.instructions_retired += 1;
        Ok(flow)
    }

    /// Links `pc + 4` into `rd` and redirects to `target`.
    fn jump(&mut self, pc: u64, rd: usize, target: u64) -> Result<Flow, Trap> {
        if target % INSTRUCTION_SIZE_32 != 0 {
            return Err(Trap::InstructionAddressMisaligned(target));
        }
        self.regs.write(rd, pc.wrapping_add(INSTRUCTION_SIZE_32));
        Ok(Flow::Jump(target))
    }

    /// Rejects immediate-form encodings that are reserved in RV64.
    fn check_imm(&self, d: &Decoded, is32: bool) -> Result<(), Trap> {
        let upper = (d.raw >> 26) & 0x3F;
        let legal = match d.funct3 {
            funct3::SLL if is32 => d.funct7 == 0,
            funct3::SLL => upper == 0,
            funct3::SRL_SRA if is32 => d.funct7 == 0 || d.funct7 == 0b010_0000,
            funct3::SRL_SRA => upper == 0 || upper == 0b01_0000,
            funct3::ADD_SUB => true,
            _ => !is32,
        };
        if legal {
            Ok(())
        } else {
            Err(Trap::IllegalInstruction(d.raw))
        }
    }
}

/// Sign-extends the low `size` bytes of `val`.
fn sign_extend(val: u64, size: usize) -> u64 {
    let shift = 64 - 8 * size as u32;
    (((val << shift) as i64) >> shift) as u64
}
