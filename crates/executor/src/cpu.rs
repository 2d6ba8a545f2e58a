//! RV32IM CPU emulator.
//!
//! A deterministic fetch-decode-execute interpreter, machine mode only:
//! - register x0 hardwired to zero
//! - strict alignment (word/halfword accesses must be aligned)
//! - no CSRs, no interrupts; `fence` is a no-op
//! - `ebreak` yields control to the caller instead of trapping, so the
//!   differential harness can sample the simulated EVM stack and resume
//! - execution halts cleanly when the program returns to the configured
//!   halt address (the harness points the initial `ra` there)
//!
//! M-extension division follows the RISC-V convention: division by zero
//! yields all-ones / the dividend rather than trapping.

use crate::decode::{
    branch_funct3, load_funct3, mul_funct3, op_funct3, opcode, store_funct3, DecodedInstr,
    FUNCT7_MULDIV,
};
use crate::error::ExecutorError;
use crate::memory::Memory;

/// ABI register indices used by the harness and the emitted programs.
pub mod reg {
    pub const ZERO: u8 = 0;
    pub const RA: u8 = 1;
    pub const SP: u8 = 2;
    pub const T0: u8 = 5;
    pub const A0: u8 = 10;
    pub const A1: u8 = 11;
    /// Context stack pointer in the emitted call-frame discipline.
    pub const S1: u8 = 9;
    /// Saved outer stack pointer.
    pub const S2: u8 = 18;
    /// Current call frame base.
    pub const S3: u8 = 19;
    /// Saved return address.
    pub const S4: u8 = 20;
}

/// What a single `step` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Instruction retired, execution continues.
    Continue,
    /// An `ebreak` was reached; `pc` still points at it. The caller samples
    /// state and resumes with [`Cpu::skip_breakpoint`].
    Breakpoint,
    /// Control transferred to the halt address; the program is done.
    Halted,
}

/// RV32IM CPU state.
pub struct Cpu {
    /// General-purpose registers x0..x31.
    pub regs: [u32; 32],
    /// Program counter.
    pub pc: u32,
    /// Retired instruction count.
    pub cycle: u64,
    /// Memory subsystem.
    pub memory: Memory,
    /// Jumping here ends execution instead of fetching.
    halt_addr: Option<u32>,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: [0; 32],
            pc: 0,
            cycle: 0,
            memory: Memory::new(),
            halt_addr: None,
        }
    }

    /// Treat a transfer of control to `addr` as a clean halt.
    pub fn set_halt_addr(&mut self, addr: u32) {
        self.halt_addr = Some(addr);
    }

    #[inline]
    pub fn set_reg(&mut self, rd: u8, val: u32) {
        if rd != 0 {
            self.regs[rd as usize] = val;
        }
    }

    #[inline]
    pub fn get_reg(&self, rs: u8) -> u32 {
        self.regs[rs as usize]
    }

    /// Resume past the `ebreak` the previous step stopped on.
    pub fn skip_breakpoint(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Result<StepOutcome, ExecutorError> {
        if Some(self.pc) == self.halt_addr {
            return Ok(StepOutcome::Halted);
        }

        let bits = self.memory.read_u32(self.pc)?;
        let instr = DecodedInstr::decode(bits);
        let pc = self.pc;
        let invalid = move || ExecutorError::InvalidInstruction { pc, bits };

        let mut next_pc = self.pc.wrapping_add(4);

        match instr.opcode {
            opcode::LUI => self.set_reg(instr.rd, instr.imm as u32),

            opcode::AUIPC => self.set_reg(instr.rd, self.pc.wrapping_add(instr.imm as u32)),

            opcode::JAL => {
                self.set_reg(instr.rd, self.pc.wrapping_add(4));
                next_pc = self.pc.wrapping_add(instr.imm as u32);
            }

            opcode::JALR => {
                let base = self.get_reg(instr.rs1);
                self.set_reg(instr.rd, self.pc.wrapping_add(4));
                next_pc = base.wrapping_add(instr.imm as u32) & !1;
            }

            opcode::BRANCH => {
                let lhs = self.get_reg(instr.rs1);
                let rhs = self.get_reg(instr.rs2);
                let taken = match instr.funct3 {
                    branch_funct3::BEQ => lhs == rhs,
                    branch_funct3::BNE => lhs != rhs,
                    branch_funct3::BLT => (lhs as i32) < (rhs as i32),
                    branch_funct3::BGE => (lhs as i32) >= (rhs as i32),
                    branch_funct3::BLTU => lhs < rhs,
                    branch_funct3::BGEU => lhs >= rhs,
                    _ => return Err(invalid()),
                };
                if taken {
                    next_pc = self.pc.wrapping_add(instr.imm as u32);
                }
            }

            opcode::LOAD => {
                let addr = self.get_reg(instr.rs1).wrapping_add(instr.imm as u32);
                let val = match instr.funct3 {
                    load_funct3::LB => (self.memory.read_u8(addr) as i8) as i32 as u32,
                    load_funct3::LH => (self.memory.read_u16(addr)? as i16) as i32 as u32,
                    load_funct3::LW => self.memory.read_u32(addr)?,
                    load_funct3::LBU => self.memory.read_u8(addr) as u32,
                    load_funct3::LHU => self.memory.read_u16(addr)? as u32,
                    _ => return Err(invalid()),
                };
                self.set_reg(instr.rd, val);
            }

            opcode::STORE => {
                let addr = self.get_reg(instr.rs1).wrapping_add(instr.imm as u32);
                let val = self.get_reg(instr.rs2);
                match instr.funct3 {
                    store_funct3::SB => self.memory.write_u8(addr, val as u8),
                    store_funct3::SH => self.memory.write_u16(addr, val as u16)?,
                    store_funct3::SW => self.memory.write_u32(addr, val)?,
                    _ => return Err(invalid()),
                }
            }

            opcode::OP_IMM => {
                let src = self.get_reg(instr.rs1);
                let imm = instr.imm as u32;
                let shamt = instr.rs2 as u32;
                let val = match instr.funct3 {
                    op_funct3::ADD_SUB => src.wrapping_add(imm),
                    op_funct3::SLT => ((src as i32) < (instr.imm)) as u32,
                    op_funct3::SLTU => (src < imm) as u32,
                    op_funct3::XOR => src ^ imm,
                    op_funct3::OR => src | imm,
                    op_funct3::AND => src & imm,
                    op_funct3::SLL => src.wrapping_shl(shamt),
                    op_funct3::SRL_SRA => {
                        if instr.funct7 & 0b0100000 != 0 {
                            ((src as i32).wrapping_shr(shamt)) as u32
                        } else {
                            src.wrapping_shr(shamt)
                        }
                    }
                    _ => return Err(invalid()),
                };
                self.set_reg(instr.rd, val);
            }

            opcode::OP if instr.funct7 == FUNCT7_MULDIV => {
                let lhs = self.get_reg(instr.rs1);
                let rhs = self.get_reg(instr.rs2);
                let val = match instr.funct3 {
                    mul_funct3::MUL => lhs.wrapping_mul(rhs),
                    mul_funct3::MULH => {
                        (((lhs as i32 as i64) * (rhs as i32 as i64)) >> 32) as u32
                    }
                    mul_funct3::MULHSU => (((lhs as i32 as i64) * (rhs as i64)) >> 32) as u32,
                    mul_funct3::MULHU => (((lhs as u64) * (rhs as u64)) >> 32) as u32,
                    mul_funct3::DIV => match (lhs as i32, rhs as i32) {
                        (_, 0) => u32::MAX,
                        (i32::MIN, -1) => i32::MIN as u32,
                        (a, b) => (a / b) as u32,
                    },
                    mul_funct3::DIVU => {
                        if rhs == 0 {
                            u32::MAX
                        } else {
                            lhs / rhs
                        }
                    }
                    mul_funct3::REM => match (lhs as i32, rhs as i32) {
                        (a, 0) => a as u32,
                        (i32::MIN, -1) => 0,
                        (a, b) => (a % b) as u32,
                    },
                    mul_funct3::REMU => {
                        if rhs == 0 {
                            lhs
                        } else {
                            lhs % rhs
                        }
                    }
                    _ => return Err(invalid()),
                };
                self.set_reg(instr.rd, val);
            }

            opcode::OP => {
                let lhs = self.get_reg(instr.rs1);
                let rhs = self.get_reg(instr.rs2);
                let shamt = rhs & 0x1F;
                let val = match instr.funct3 {
                    op_funct3::ADD_SUB => {
                        if instr.funct7 & 0b0100000 != 0 {
                            lhs.wrapping_sub(rhs)
                        } else {
                            lhs.wrapping_add(rhs)
                        }
                    }
                    op_funct3::SLL => lhs.wrapping_shl(shamt),
                    op_funct3::SLT => ((lhs as i32) < (rhs as i32)) as u32,
                    op_funct3::SLTU => (lhs < rhs) as u32,
                    op_funct3::XOR => lhs ^ rhs,
                    op_funct3::SRL_SRA => {
                        if instr.funct7 & 0b0100000 != 0 {
                            ((lhs as i32).wrapping_shr(shamt)) as u32
                        } else {
                            lhs.wrapping_shr(shamt)
                        }
                    }
                    op_funct3::OR => lhs | rhs,
                    op_funct3::AND => lhs & rhs,
                    _ => return Err(invalid()),
                };
                self.set_reg(instr.rd, val);
            }

            opcode::SYSTEM => {
                // imm distinguishes ecall (0) from ebreak (1).
                return match instr.imm {
                    1 => Ok(StepOutcome::Breakpoint),
                    0 => Err(ExecutorError::Ecall { pc: self.pc }),
                    _ => Err(invalid()),
                };
            }

            opcode::MISC_MEM => {
                // fence: single-threaded machine, nothing to order.
            }

            _ => return Err(invalid()),
        }

        self.pc = next_pc;
        self.cycle += 1;

        if Some(self.pc) == self.halt_addr {
            return Ok(StepOutcome::Halted);
        }
        Ok(StepOutcome::Continue)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    fn run_asm(source: &str) -> Cpu {
        let program = assemble(source).expect("assemble");
        let mut cpu = Cpu::new();
        cpu.memory.load_image(program.text_base, &program.text);
        cpu.memory.load_image(program.data_base, &program.data);
        cpu.pc = program.entry;
        cpu.set_reg(reg::RA, 0);
        cpu.set_halt_addr(0);
        for _ in 0..10_000 {
            match cpu.step().expect("step") {
                StepOutcome::Continue => {}
                StepOutcome::Breakpoint => cpu.skip_breakpoint(),
                StepOutcome::Halted => return cpu,
            }
        }
        panic!("program did not halt");
    }

    #[test]
    fn test_arithmetic_loop() {
        // Sum 1..=10 into a0.
        let cpu = run_asm(
            r#"
            .text
            .global execute
            execute:
                li a0, 0
                li t0, 10
            loop:
                add a0, a0, t0
                addi t0, t0, -1
                bnez t0, loop
                ret
            "#,
        );
        assert_eq!(cpu.get_reg(reg::A0), 55);
    }

    #[test]
    fn test_mul_carry_chain() {
        let cpu = run_asm(
            r#"
            .text
            .global execute
            execute:
                li t0, 0xFFFFFFFF
                li t1, 0xFFFFFFFF
                mul a0, t0, t1
                mulhu a1, t0, t1
                ret
            "#,
        );
        // 0xFFFFFFFF^2 = 0xFFFFFFFE_00000001
        assert_eq!(cpu.get_reg(reg::A0), 0x0000_0001);
        assert_eq!(cpu.get_reg(reg::A1), 0xFFFF_FFFE);
    }

    #[test]
    fn test_division_by_zero_yields_all_ones() {
        let cpu = run_asm(
            r#"
            .text
            .global execute
            execute:
                li t0, 42
                li t1, 0
                divu a0, t0, t1
                remu a1, t0, t1
                ret
            "#,
        );
        assert_eq!(cpu.get_reg(reg::A0), u32::MAX);
        assert_eq!(cpu.get_reg(reg::A1), 42);
    }

    #[test]
    fn test_memory_store_load() {
        let cpu = run_asm(
            r#"
            .text
            .global execute
            execute:
                li t0, 0x7fff0000
                li t1, 0xCAFEBABE
                sw t1, 8(t0)
                lw a0, 8(t0)
                lbu a1, 8(t0)
                ret
            "#,
        );
        assert_eq!(cpu.get_reg(reg::A0), 0xCAFE_BABE);
        assert_eq!(cpu.get_reg(reg::A1), 0xBE);
    }

    #[test]
    fn test_x0_is_hardwired() {
        let cpu = run_asm(
            r#"
            .text
            .global execute
            execute:
                li t0, 7
                addi zero, t0, 1
                mv a0, zero
                ret
            "#,
        );
        assert_eq!(cpu.get_reg(reg::A0), 0);
    }
}
