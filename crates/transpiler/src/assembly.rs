//! The emitted assembly file model and its serializations.
//!
//! An [`AssemblyFile`] is the transpiler's output: the ordered instruction
//! stream plus the data section. Two text forms exist:
//!
//! - **toolchain mode** strips the `ebreak` sentinels and is what the zkVM
//!   toolchain compiles;
//! - **debug mode** keeps them and is what the differential harness and the
//!   bisection tool consume.
//!
//! Both wrap the stream in the `execute` entry point. The prologue saves the
//! caller's `sp`/`ra` into callee-saved registers, fixes the call-frame base
//! (`s3`) and points `s1` at the top of the call-context stack; the epilogue
//! restores and returns, so the zkVM host can call `execute` as an ordinary
//! function. The 256-bit helper library is concatenated verbatim at the end
//! of `.text`.

use crate::data_section::DataVariable;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Top of the auxiliary call-context stack; `s1` starts here. Distinct from
/// the operand stack region, which grows down from the host-provided `sp`.
pub const CONTEXT_STACK_TOP: u32 = 0x6fff_0000;

/// Mnemonic of the per-step sentinel instruction.
pub const BREAKPOINT: &str = "ebreak";

/// The 256-bit helper library linked into every emitted program.
pub const UINT256_LIBRARY: &str = include_str!("runtime/uint256.s");

/// One emitted instruction: mnemonic plus textual operands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub mnemonic: String,
    pub operands: Vec<String>,
}

impl Instruction {
    pub fn new<const N: usize>(mnemonic: &str, operands: [&str; N]) -> Self {
        Self {
            mnemonic: mnemonic.to_string(),
            operands: operands.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// An operand-less instruction.
    pub fn bare(mnemonic: &str) -> Self {
        Self {
            mnemonic: mnemonic.to_string(),
            operands: Vec::new(),
        }
    }

    pub fn is_breakpoint(&self) -> bool {
        self.mnemonic == BREAKPOINT
    }

    fn render(&self, out: &mut String) {
        out.push('\t');
        out.push_str(&self.mnemonic);
        for (i, operand) in self.operands.iter().enumerate() {
            out.push_str(if i == 0 { " " } else { ", " });
            out.push_str(operand);
        }
        out.push('\n');
    }
}

/// The transpiler's output: instruction stream plus data section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyFile {
    pub instructions: Vec<Instruction>,
    pub data_section: Vec<DataVariable>,
}

impl AssemblyFile {
    /// Toolchain-compatible text: `ebreak` sentinels elided.
    pub fn to_toolchain_assembly(&self) -> String {
        self.render(false)
    }

    /// Debug text: `ebreak` sentinels kept for the differential harness.
    pub fn to_debug_assembly(&self) -> String {
        self.render(true)
    }

    fn render(&self, keep_breakpoints: bool) -> String {
        let mut out = String::new();

        if !self.data_section.is_empty() {
            out.push_str(".data\n");
            for var in &self.data_section {
                let _ = writeln!(out, "{}:", var.name);
                // Eight words, most significant first; each word is stored
                // little-endian by the assembler.
                for limb in var.value.limbs() {
                    let _ = writeln!(out, "\t.word {limb:#010x}");
                }
            }
            out.push('\n');
        }

        out.push_str(".text\n.global execute\nexecute:\n");
        out.push_str("\tmv s2, sp\n");
        out.push_str("\tmv s4, ra\n");
        out.push_str("\tmv s3, sp\n");
        let _ = writeln!(out, "\tli s1, {CONTEXT_STACK_TOP:#x}");
        out.push('\n');

        for instr in &self.instructions {
            if !keep_breakpoints && instr.is_breakpoint() {
                continue;
            }
            instr.render(&mut out);
        }

        out.push('\n');
        out.push_str("\tmv sp, s2\n");
        out.push_str("\tmv ra, s4\n");
        out.push_str("\tret\n\n");
        out.push_str(UINT256_LIBRARY);
        out
    }
}
