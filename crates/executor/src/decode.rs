//! RV32IM instruction decoder.

use serde::{Deserialize, Serialize};

/// Decoded RISC-V instruction fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInstr {
    /// Raw 32-bit instruction bits.
    pub bits: u32,
    /// Major opcode (bits [6:0]).
    pub opcode: u8,
    pub rd: u8,
    pub funct3: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub funct7: u8,
    /// Immediate, sign-extended per the instruction format.
    pub imm: i32,
}

/// Major opcode constants for RV32IM.
pub mod opcode {
    pub const LUI: u8 = 0b0110111;
    pub const AUIPC: u8 = 0b0010111;
    pub const JAL: u8 = 0b1101111;
    pub const JALR: u8 = 0b1100111;
    pub const BRANCH: u8 = 0b1100011;
    pub const LOAD: u8 = 0b0000011;
    pub const STORE: u8 = 0b0100011;
    pub const OP_IMM: u8 = 0b0010011;
    pub const OP: u8 = 0b0110011;
    pub const SYSTEM: u8 = 0b1110011;
    pub const MISC_MEM: u8 = 0b0001111;
}

pub mod branch_funct3 {
    pub const BEQ: u8 = 0b000;
    pub const BNE: u8 = 0b001;
    pub const BLT: u8 = 0b100;
    pub const BGE: u8 = 0b101;
    pub const BLTU: u8 = 0b110;
    pub const BGEU: u8 = 0b111;
}

pub mod load_funct3 {
    pub const LB: u8 = 0b000;
    pub const LH: u8 = 0b001;
    pub const LW: u8 = 0b010;
    pub const LBU: u8 = 0b100;
    pub const LHU: u8 = 0b101;
}

pub mod store_funct3 {
    pub const SB: u8 = 0b000;
    pub const SH: u8 = 0b001;
    pub const SW: u8 = 0b010;
}

pub mod op_funct3 {
    pub const ADD_SUB: u8 = 0b000;
    pub const SLL: u8 = 0b001;
    pub const SLT: u8 = 0b010;
    pub const SLTU: u8 = 0b011;
    pub const XOR: u8 = 0b100;
    pub const SRL_SRA: u8 = 0b101;
    pub const OR: u8 = 0b110;
    pub const AND: u8 = 0b111;
}

/// funct3 values for the M extension (funct7 = 0b0000001).
pub mod mul_funct3 {
    pub const MUL: u8 = 0b000;
    pub const MULH: u8 = 0b001;
    pub const MULHSU: u8 = 0b010;
    pub const MULHU: u8 = 0b011;
    pub const DIV: u8 = 0b100;
    pub const DIVU: u8 = 0b101;
    pub const REM: u8 = 0b110;
    pub const REMU: u8 = 0b111;
}

/// funct7 marking an M-extension OP instruction.
pub const FUNCT7_MULDIV: u8 = 0b0000001;

/// Encoded `ebreak` instruction (imm=1 distinguishes it from `ecall`).
pub const EBREAK_BITS: u32 = 0x0010_0073;

/// Encoded `ecall` instruction.
pub const ECALL_BITS: u32 = 0x0000_0073;

impl DecodedInstr {
    /// Decode a raw 32-bit instruction word. The immediate is extracted and
    /// sign-extended according to the format implied by the major opcode.
    pub fn decode(bits: u32) -> Self {
        let major = (bits & 0x7F) as u8;
        let rd = ((bits >> 7) & 0x1F) as u8;
        let funct3 = ((bits >> 12) & 0x7) as u8;
        let rs1 = ((bits >> 15) & 0x1F) as u8;
        let rs2 = ((bits >> 20) & 0x1F) as u8;
        let funct7 = ((bits >> 25) & 0x7F) as u8;

        let imm = match major {
            opcode::LUI | opcode::AUIPC => (bits & 0xFFFF_F000) as i32,
            opcode::JAL => {
                let imm20 = ((bits >> 31) & 1) as i32;
                let imm10_1 = ((bits >> 21) & 0x3FF) as i32;
                let imm11 = ((bits >> 20) & 1) as i32;
                let imm19_12 = ((bits >> 12) & 0xFF) as i32;
                let imm = (imm20 << 20) | (imm19_12 << 12) | (imm11 << 11) | (imm10_1 << 1);
                (imm << 11) >> 11
            }
            opcode::BRANCH => {
                let imm12 = ((bits >> 31) & 1) as i32;
                let imm10_5 = ((bits >> 25) & 0x3F) as i32;
                let imm4_1 = ((bits >> 8) & 0xF) as i32;
                let imm11 = ((bits >> 7) & 1) as i32;
                let imm = (imm12 << 12) | (imm11 << 11) | (imm10_5 << 5) | (imm4_1 << 1);
                (imm << 19) >> 19
            }
            opcode::STORE => {
                let imm11_5 = ((bits >> 25) & 0x7F) as i32;
                let imm4_0 = ((bits >> 7) & 0x1F) as i32;
                let imm = (imm11_5 << 5) | imm4_0;
                (imm << 20) >> 20
            }
            // I-type covers loads, OP-IMM, JALR and SYSTEM.
            _ => (bits as i32) >> 20,
        };

        Self {
            bits,
            opcode: major,
            rd,
            funct3,
            rs1,
            rs2,
            funct7,
            imm,
        }
    }
}
