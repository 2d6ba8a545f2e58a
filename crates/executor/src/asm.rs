//! Two-pass assembler for the RV32IM subset the transpiler emits.
//!
//! This is the in-process replacement for the external cross-assembler the
//! original pipeline shelled out to. It understands exactly what the emitted
//! programs and the 256-bit helper library use: the base integer and M
//! instructions, the usual pseudo-instructions (`li`, `la`, `mv`, `call`,
//! `j`, `ret`, `beqz`, `bnez`, ...), named labels, and the `.text`/`.data`/
//! `.word`/`.global` directives.
//!
//! Layout: `.text` is placed at [`TEXT_BASE`], `.data` on the next page
//! boundary after it. `la` resolves symbols to absolute addresses via
//! `lui`+`addi`, so the image is position-dependent by construction.

use crate::error::AsmError;
use std::collections::HashMap;

/// Base address of the assembled `.text` section.
pub const TEXT_BASE: u32 = 0x0001_0000;

const PAGE: u32 = 0x1000;

/// An assembled program image.
#[derive(Debug, Clone)]
pub struct Program {
    pub text_base: u32,
    pub text: Vec<u8>,
    pub data_base: u32,
    pub data: Vec<u8>,
    /// Address of the `execute` symbol if defined, else `text_base`.
    pub entry: u32,
    /// All resolved labels.
    pub symbols: HashMap<String, u32>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Text,
    Data,
}

struct SourceInstr {
    line: usize,
    mnemonic: String,
    operands: Vec<String>,
    /// Byte offset within `.text`.
    offset: u32,
}

/// Assemble a source listing into a program image.
pub fn assemble(source: &str) -> Result<Program, AsmError> {
    let mut section = Section::Text;
    let mut text_off: u32 = 0;
    let mut data_off: u32 = 0;
    let mut instrs: Vec<SourceInstr> = Vec::new();
    let mut data_words: Vec<u32> = Vec::new();
    let mut labels: HashMap<String, (Section, u32)> = HashMap::new();

    // Pass 1: record label offsets and instruction sizes.
    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let mut line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();

        while let Some(colon) = find_label(line) {
            let name = line[..colon].trim();
            if !is_valid_label(name) {
                return Err(AsmError::Syntax {
                    line: line_no,
                    message: format!("bad label `{name}`"),
                });
            }
            let target = match section {
                Section::Text => (Section::Text, text_off),
                Section::Data => (Section::Data, data_off),
            };
            if labels.insert(name.to_string(), target).is_some() {
                return Err(AsmError::DuplicateLabel {
                    name: name.to_string(),
                });
            }
            line = line[colon + 1..].trim();
        }
        if line.is_empty() {
            continue;
        }

        if let Some(directive) = line.strip_prefix('.') {
            let mut parts = directive.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or("");
            let rest = parts.next().unwrap_or("").trim();
            match name {
                "text" => section = Section::Text,
                "data" => section = Section::Data,
                "global" | "globl" => {} // visibility only; all labels are visible here
                "align" => {}            // emission is already word-aligned
                "word" => {
                    if section != Section::Data {
                        return Err(AsmError::Syntax {
                            line: line_no,
                            message: ".word outside .data".to_string(),
                        });
                    }
                    for value in rest.split(',') {
                        let imm = parse_imm(value.trim(), line_no, ".word")?;
                        data_words.push(imm as u32);
                        data_off += 4;
                    }
                }
                other => {
                    return Err(AsmError::Syntax {
                        line: line_no,
                        message: format!("unsupported directive .{other}"),
                    });
                }
            }
            continue;
        }

        if section != Section::Text {
            return Err(AsmError::Syntax {
                line: line_no,
                message: "instruction outside .text".to_string(),
            });
        }

        let (mnemonic, operands) = split_instruction(line);
        let words = instr_size(&mnemonic, &operands, line_no)?;
        instrs.push(SourceInstr {
            line: line_no,
            mnemonic,
            operands,
            offset: text_off,
        });
        text_off += words * 4;
    }

    let data_base = (TEXT_BASE + text_off + PAGE - 1) & !(PAGE - 1);
    let symbols: HashMap<String, u32> = labels
        .into_iter()
        .map(|(name, (sect, off))| {
            let addr = match sect {
                Section::Text => TEXT_BASE + off,
                Section::Data => data_base + off,
            };
            (name, addr)
        })
        .collect();

    // Pass 2: encode.
    let mut text = Vec::with_capacity(text_off as usize);
    for instr in &instrs {
        let pc = TEXT_BASE + instr.offset;
        for word in encode(instr, pc, &symbols)? {
            text.extend_from_slice(&word.to_le_bytes());
        }
    }

    let mut data = Vec::with_capacity(data_words.len() * 4);
    for word in &data_words {
        data.extend_from_slice(&word.to_le_bytes());
    }

    let entry = symbols.get("execute").copied().unwrap_or(TEXT_BASE);
    Ok(Program {
        text_base: TEXT_BASE,
        text,
        data_base,
        data,
        entry,
        symbols,
    })
}

/// Find the colon ending a leading label, if any. Labels precede any
/// mnemonic on the line and contain no whitespace or parentheses.
fn find_label(line: &str) -> Option<usize> {
    let colon = line.find(':')?;
    let head = &line[..colon];
    if head.is_empty() || head.contains(char::is_whitespace) || head.contains('(') {
        return None;
    }
    Some(colon)
}

fn is_valid_label(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}

fn split_instruction(line: &str) -> (String, Vec<String>) {
    let mut parts = line.splitn(2, char::is_whitespace);
    let mnemonic = parts.next().unwrap_or("").to_ascii_lowercase();
    let operands = parts
        .next()
        .map(|rest| {
            rest.split(',')
                .map(|tok| tok.trim().to_string())
                .filter(|tok| !tok.is_empty())
                .collect()
        })
        .unwrap_or_default();
    (mnemonic, operands)
}

/// Number of machine words a (possibly pseudo) instruction expands to.
fn instr_size(mnemonic: &str, operands: &[String], line: usize) -> Result<u32, AsmError> {
    Ok(match mnemonic {
        "li" => {
            let imm = parse_imm(operands.get(1).map(String::as_str).unwrap_or(""), line, "li")?;
            if (-2048..=2047).contains(&imm) {
                1
            } else {
                2
            }
        }
        "la" => 2,
        _ => 1,
    })
}

fn parse_reg(tok: &str, line: usize) -> Result<u8, AsmError> {
    let reg = match tok {
        "zero" | "x0" => 0,
        "ra" | "x1" => 1,
        "sp" | "x2" => 2,
        "gp" | "x3" => 3,
        "tp" | "x4" => 4,
        "t0" | "x5" => 5,
        "t1" | "x6" => 6,
        "t2" | "x7" => 7,
        "s0" | "fp" | "x8" => 8,
        "s1" | "x9" => 9,
        "a0" | "x10" => 10,
        "a1" | "x11" => 11,
        "a2" | "x12" => 12,
        "a3" | "x13" => 13,
        "a4" | "x14" => 14,
        "a5" | "x15" => 15,
        "a6" | "x16" => 16,
        "a7" | "x17" => 17,
        "s2" | "x18" => 18,
        "s3" | "x19" => 19,
        "s4" | "x20" => 20,
        "s5" | "x21" => 21,
        "s6" | "x22" => 22,
        "s7" | "x23" => 23,
        "s8" | "x24" => 24,
        "s9" | "x25" => 25,
        "s10" | "x26" => 26,
        "s11" | "x27" => 27,
        "t3" | "x28" => 28,
        "t4" | "x29" => 29,
        "t5" | "x30" => 30,
        "t6" | "x31" => 31,
        _ => {
            return Err(AsmError::UnknownRegister {
                line,
                name: tok.to_string(),
            })
        }
    };
    Ok(reg)
}

fn parse_imm(tok: &str, line: usize, mnemonic: &str) -> Result<i64, AsmError> {
    let bad = |_| AsmError::Syntax {
        line,
        message: format!("bad immediate `{tok}` for `{mnemonic}`"),
    };
    let (neg, body) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, tok),
    };
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).map_err(bad)?
    } else {
        body.parse::<i64>().map_err(bad)?
    };
    let value = if neg { -value } else { value };
    if !(-(1i64 << 31)..(1i64 << 32)).contains(&value) {
        return Err(AsmError::ImmediateOutOfRange {
            line,
            mnemonic: mnemonic.to_string(),
            value,
        });
    }
    Ok(value)
}

/// Parse an `imm(reg)` memory operand.
fn parse_mem(tok: &str, line: usize, mnemonic: &str) -> Result<(i64, u8), AsmError> {
    let open = tok.find('(').ok_or_else(|| AsmError::Syntax {
        line,
        message: format!("expected `imm(reg)`, got `{tok}`"),
    })?;
    let close = tok.rfind(')').ok_or_else(|| AsmError::Syntax {
        line,
        message: format!("unclosed memory operand `{tok}`"),
    })?;
    let imm_text = tok[..open].trim();
    let imm = if imm_text.is_empty() {
        0
    } else {
        parse_imm(imm_text, line, mnemonic)?
    };
    if !(-2048..=2047).contains(&imm) {
        return Err(AsmError::ImmediateOutOfRange {
            line,
            mnemonic: mnemonic.to_string(),
            value: imm,
        });
    }
    let reg = parse_reg(tok[open + 1..close].trim(), line)?;
    Ok((imm, reg))
}

struct Ctx<'a> {
    line: usize,
    mnemonic: &'a str,
    operands: &'a [String],
    pc: u32,
    symbols: &'a HashMap<String, u32>,
}

impl<'a> Ctx<'a> {
    fn op(&self, idx: usize) -> Result<&'a str, AsmError> {
        self.operands
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| AsmError::Syntax {
                line: self.line,
                message: format!("`{}` missing operand {}", self.mnemonic, idx + 1),
            })
    }

    fn reg(&self, idx: usize) -> Result<u8, AsmError> {
        parse_reg(self.op(idx)?, self.line)
    }

    fn imm(&self, idx: usize) -> Result<i64, AsmError> {
        parse_imm(self.op(idx)?, self.line, self.mnemonic)
    }

    fn imm12(&self, idx: usize) -> Result<i32, AsmError> {
        let imm = self.imm(idx)?;
        if !(-2048..=2047).contains(&imm) {
            return Err(AsmError::ImmediateOutOfRange {
                line: self.line,
                mnemonic: self.mnemonic.to_string(),
                value: imm,
            });
        }
        Ok(imm as i32)
    }

    fn shamt(&self, idx: usize) -> Result<u8, AsmError> {
        let imm = self.imm(idx)?;
        if !(0..32).contains(&imm) {
            return Err(AsmError::ImmediateOutOfRange {
                line: self.line,
                mnemonic: self.mnemonic.to_string(),
                value: imm,
            });
        }
        Ok(imm as u8)
    }

    fn symbol(&self, idx: usize) -> Result<u32, AsmError> {
        let name = self.op(idx)?;
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| AsmError::UndefinedSymbol {
                name: name.to_string(),
            })
    }

    fn branch_offset(&self, idx: usize) -> Result<i32, AsmError> {
        let target = self.symbol(idx)?;
        let offset = target.wrapping_sub(self.pc) as i32;
        if !(-4096..=4094).contains(&offset) {
            return Err(AsmError::BranchOutOfRange {
                line: self.line,
                target: self.op(idx)?.to_string(),
            });
        }
        Ok(offset)
    }

    fn jump_offset(&self, idx: usize) -> Result<i32, AsmError> {
        let target = self.symbol(idx)?;
        let offset = target.wrapping_sub(self.pc) as i32;
        if !(-(1 << 20)..(1 << 20)).contains(&offset) {
            return Err(AsmError::BranchOutOfRange {
                line: self.line,
                target: self.op(idx)?.to_string(),
            });
        }
        Ok(offset)
    }
}

fn encode(
    instr: &SourceInstr,
    pc: u32,
    symbols: &HashMap<String, u32>,
) -> Result<Vec<u32>, AsmError> {
    use crate::decode::opcode as op;

    let ctx = Ctx {
        line: instr.line,
        mnemonic: &instr.mnemonic,
        operands: &instr.operands,
        pc,
        symbols,
    };

    let words = match instr.mnemonic.as_str() {
        // ---- OP-IMM ----
        "addi" => vec![i_type(ctx.imm12(2)?, ctx.reg(1)?, 0b000, ctx.reg(0)?, op::OP_IMM)],
        "slti" => vec![i_type(ctx.imm12(2)?, ctx.reg(1)?, 0b010, ctx.reg(0)?, op::OP_IMM)],
        "sltiu" => vec![i_type(ctx.imm12(2)?, ctx.reg(1)?, 0b011, ctx.reg(0)?, op::OP_IMM)],
        "xori" => vec![i_type(ctx.imm12(2)?, ctx.reg(1)?, 0b100, ctx.reg(0)?, op::OP_IMM)],
        "ori" => vec![i_type(ctx.imm12(2)?, ctx.reg(1)?, 0b110, ctx.reg(0)?, op::OP_IMM)],
        "andi" => vec![i_type(ctx.imm12(2)?, ctx.reg(1)?, 0b111, ctx.reg(0)?, op::OP_IMM)],
        "slli" => vec![shift_imm(0b0000000, ctx.shamt(2)?, ctx.reg(1)?, 0b001, ctx.reg(0)?)],
        "srli" => vec![shift_imm(0b0000000, ctx.shamt(2)?, ctx.reg(1)?, 0b101, ctx.reg(0)?)],
        "srai" => vec![shift_imm(0b0100000, ctx.shamt(2)?, ctx.reg(1)?, 0b101, ctx.reg(0)?)],

        // ---- OP ----
        "add" => vec![r_type(0b0000000, ctx.reg(2)?, ctx.reg(1)?, 0b000, ctx.reg(0)?)],
        "sub" => vec![r_type(0b0100000, ctx.reg(2)?, ctx.reg(1)?, 0b000, ctx.reg(0)?)],
        "sll" => vec![r_type(0b0000000, ctx.reg(2)?, ctx.reg(1)?, 0b001, ctx.reg(0)?)],
        "slt" => vec![r_type(0b0000000, ctx.reg(2)?, ctx.reg(1)?, 0b010, ctx.reg(0)?)],
        "sltu" => vec![r_type(0b0000000, ctx.reg(2)?, ctx.reg(1)?, 0b011, ctx.reg(0)?)],
        "xor" => vec![r_type(0b0000000, ctx.reg(2)?, ctx.reg(1)?, 0b100, ctx.reg(0)?)],
        "srl" => vec![r_type(0b0000000, ctx.reg(2)?, ctx.reg(1)?, 0b101, ctx.reg(0)?)],
        "sra" => vec![r_type(0b0100000, ctx.reg(2)?, ctx.reg(1)?, 0b101, ctx.reg(0)?)],
        "or" => vec![r_type(0b0000000, ctx.reg(2)?, ctx.reg(1)?, 0b110, ctx.reg(0)?)],
        "and" => vec![r_type(0b0000000, ctx.reg(2)?, ctx.reg(1)?, 0b111, ctx.reg(0)?)],

        // ---- M extension ----
        "mul" => vec![r_type(0b0000001, ctx.reg(2)?, ctx.reg(1)?, 0b000, ctx.reg(0)?)],
        "mulh" => vec![r_type(0b0000001, ctx.reg(2)?, ctx.reg(1)?, 0b001, ctx.reg(0)?)],
        "mulhsu" => vec![r_type(0b0000001, ctx.reg(2)?, ctx.reg(1)?, 0b010, ctx.reg(0)?)],
        "mulhu" => vec![r_type(0b0000001, ctx.reg(2)?, ctx.reg(1)?, 0b011, ctx.reg(0)?)],
        "div" => vec![r_type(0b0000001, ctx.reg(2)?, ctx.reg(1)?, 0b100, ctx.reg(0)?)],
        "divu" => vec![r_type(0b0000001, ctx.reg(2)?, ctx.reg(1)?, 0b101, ctx.reg(0)?)],
        "rem" => vec![r_type(0b0000001, ctx.reg(2)?, ctx.reg(1)?, 0b110, ctx.reg(0)?)],
        "remu" => vec![r_type(0b0000001, ctx.reg(2)?, ctx.reg(1)?, 0b111, ctx.reg(0)?)],

        // ---- loads/stores ----
        "lw" | "lh" | "lhu" | "lb" | "lbu" => {
            let funct3 = match instr.mnemonic.as_str() {
                "lb" => 0b000,
                "lh" => 0b001,
                "lw" => 0b010,
                "lbu" => 0b100,
                _ => 0b101,
            };
            let (imm, base) = parse_mem(ctx.op(1)?, ctx.line, ctx.mnemonic)?;
            vec![i_type(imm as i32, base, funct3, ctx.reg(0)?, op::LOAD)]
        }
        "sw" | "sh" | "sb" => {
            let funct3 = match instr.mnemonic.as_str() {
                "sb" => 0b000,
                "sh" => 0b001,
                _ => 0b010,
            };
            let (imm, base) = parse_mem(ctx.op(1)?, ctx.line, ctx.mnemonic)?;
            vec![s_type(imm as i32, ctx.reg(0)?, base, funct3)]
        }

        // ---- upper immediates ----
        "lui" => {
            let imm = ctx.imm(1)?;
            if !(0..(1 << 20)).contains(&imm) {
                return Err(AsmError::ImmediateOutOfRange {
                    line: ctx.line,
                    mnemonic: "lui".to_string(),
                    value: imm,
                });
            }
            vec![u_type(imm as u32, ctx.reg(0)?, op::LUI)]
        }
        "auipc" => vec![u_type(ctx.imm(1)? as u32 & 0xFFFFF, ctx.reg(0)?, op::AUIPC)],

        // ---- branches ----
        "beq" => vec![b_type(ctx.branch_offset(2)?, ctx.reg(1)?, ctx.reg(0)?, 0b000)],
        "bne" => vec![b_type(ctx.branch_offset(2)?, ctx.reg(1)?, ctx.reg(0)?, 0b001)],
        "blt" => vec![b_type(ctx.branch_offset(2)?, ctx.reg(1)?, ctx.reg(0)?, 0b100)],
        "bge" => vec![b_type(ctx.branch_offset(2)?, ctx.reg(1)?, ctx.reg(0)?, 0b101)],
        "bltu" => vec![b_type(ctx.branch_offset(2)?, ctx.reg(1)?, ctx.reg(0)?, 0b110)],
        "bgeu" => vec![b_type(ctx.branch_offset(2)?, ctx.reg(1)?, ctx.reg(0)?, 0b111)],
        "beqz" => vec![b_type(ctx.branch_offset(1)?, 0, ctx.reg(0)?, 0b000)],
        "bnez" => vec![b_type(ctx.branch_offset(1)?, 0, ctx.reg(0)?, 0b001)],
        "bltz" => vec![b_type(ctx.branch_offset(1)?, 0, ctx.reg(0)?, 0b100)],
        "bgez" => vec![b_type(ctx.branch_offset(1)?, 0, ctx.reg(0)?, 0b101)],

        // ---- jumps ----
        "jal" => match instr.operands.len() {
            1 => vec![j_type(ctx.jump_offset(0)?, 1)],
            _ => vec![j_type(ctx.jump_offset(1)?, ctx.reg(0)?)],
        },
        "jalr" => match instr.operands.len() {
            1 => vec![i_type(0, ctx.reg(0)?, 0b000, 1, op::JALR)],
            _ => {
                let (imm, base) = parse_mem(ctx.op(1)?, ctx.line, ctx.mnemonic)?;
                vec![i_type(imm as i32, base, 0b000, ctx.reg(0)?, op::JALR)]
            }
        },
        "call" => vec![j_type(ctx.jump_offset(0)?, 1)],
        "j" => vec![j_type(ctx.jump_offset(0)?, 0)],
        "jr" => vec![i_type(0, ctx.reg(0)?, 0b000, 0, op::JALR)],
        "ret" => vec![i_type(0, 1, 0b000, 0, op::JALR)],

        // ---- system ----
        "ebreak" => vec![crate::decode::EBREAK_BITS],
        "ecall" => vec![crate::decode::ECALL_BITS],

        // ---- pseudo-instructions ----
        "nop" => vec![i_type(0, 0, 0b000, 0, op::OP_IMM)],
        "mv" => vec![i_type(0, ctx.reg(1)?, 0b000, ctx.reg(0)?, op::OP_IMM)],
        "not" => vec![i_type(-1, ctx.reg(1)?, 0b100, ctx.reg(0)?, op::OP_IMM)],
        "neg" => vec![r_type(0b0100000, ctx.reg(1)?, 0, 0b000, ctx.reg(0)?)],
        "seqz" => vec![i_type(1, ctx.reg(1)?, 0b011, ctx.reg(0)?, op::OP_IMM)],
        "snez" => vec![r_type(0b0000000, ctx.reg(1)?, 0, 0b011, ctx.reg(0)?)],
        "li" => {
            let rd = ctx.reg(0)?;
            let imm = ctx.imm(1)?;
            if (-2048..=2047).contains(&imm) {
                vec![i_type(imm as i32, 0, 0b000, rd, op::OP_IMM)]
            } else {
                let (hi, lo) = hi_lo(imm as u32);
                vec![
                    u_type(hi, rd, op::LUI),
                    i_type(lo, rd, 0b000, rd, op::OP_IMM),
                ]
            }
        }
        "la" => {
            let rd = ctx.reg(0)?;
            let addr = ctx.symbol(1)?;
            let (hi, lo) = hi_lo(addr);
            vec![
                u_type(hi, rd, op::LUI),
                i_type(lo, rd, 0b000, rd, op::OP_IMM),
            ]
        }

        other => {
            return Err(AsmError::UnknownMnemonic {
                line: instr.line,
                mnemonic: other.to_string(),
            })
        }
    };
    Ok(words)
}

/// Split an absolute value into a `lui`/`addi` pair, compensating for the
/// sign extension of the low 12 bits.
fn hi_lo(value: u32) -> (u32, i32) {
    let mut lo = (value & 0xFFF) as i32;
    if lo >= 0x800 {
        lo -= 0x1000;
    }
    let hi = (value.wrapping_sub(lo as u32) >> 12) & 0xFFFFF;
    (hi, lo)
}

fn r_type(funct7: u8, rs2: u8, rs1: u8, funct3: u8, rd: u8) -> u32 {
    ((funct7 as u32) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | ((funct3 as u32) << 12)
        | ((rd as u32) << 7)
        | (crate::decode::opcode::OP as u32)
}

fn shift_imm(funct7: u8, shamt: u8, rs1: u8, funct3: u8, rd: u8) -> u32 {
    ((funct7 as u32) << 25)
        | ((shamt as u32) << 20)
        | ((rs1 as u32) << 15)
        | ((funct3 as u32) << 12)
        | ((rd as u32) << 7)
        | (crate::decode::opcode::OP_IMM as u32)
}

fn i_type(imm: i32, rs1: u8, funct3: u8, rd: u8, opcode: u8) -> u32 {
    (((imm as u32) & 0xFFF) << 20)
        | ((rs1 as u32) << 15)
        | ((funct3 as u32) << 12)
        | ((rd as u32) << 7)
        | (opcode as u32)
}

fn s_type(imm: i32, rs2: u8, rs1: u8, funct3: u8) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7F) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | ((funct3 as u32) << 12)
        | ((imm & 0x1F) << 7)
        | (crate::decode::opcode::STORE as u32)
}

fn b_type(offset: i32, rs2: u8, rs1: u8, funct3: u8) -> u32 {
    let imm = offset as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | ((funct3 as u32) << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 1) << 7)
        | (crate::decode::opcode::BRANCH as u32)
}

fn u_type(imm20: u32, rd: u8, opcode: u8) -> u32 {
    (imm20 << 12) | ((rd as u32) << 7) | (opcode as u32)
}

fn j_type(offset: i32, rd: u8) -> u32 {
    let imm = offset as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xFF) << 12)
        | ((rd as u32) << 7)
        | (crate::decode::opcode::JAL as u32)
}
