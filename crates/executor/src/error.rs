//! Executor and assembler errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("invalid instruction at pc={pc:#x}: {bits:#010x}")]
    InvalidInstruction { pc: u32, bits: u32 },

    #[error("unaligned {access} at address {addr:#x}")]
    UnalignedAccess { addr: u32, access: &'static str },

    #[error("execution halted: reached max steps ({max_steps})")]
    MaxStepsReached { max_steps: u64 },

    #[error("ecall at pc={pc:#x}: syscalls are not available to emitted programs")]
    Ecall { pc: u32 },

    #[error("stack pointer {sp:#x} above frame base {base:#x} while sampling")]
    InvalidStackWindow { sp: u32, base: u32 },

    #[error(transparent)]
    Assembly(#[from] AsmError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: syntax error: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: unknown mnemonic `{mnemonic}`")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: unknown register `{name}`")]
    UnknownRegister { line: usize, name: String },

    #[error("line {line}: immediate {value} out of range for `{mnemonic}`")]
    ImmediateOutOfRange {
        line: usize,
        mnemonic: String,
        value: i64,
    },

    #[error("line {line}: branch target `{target}` out of range")]
    BranchOutOfRange { line: usize, target: String },

    #[error("undefined symbol `{name}`")]
    UndefinedSymbol { name: String },

    #[error("duplicate label `{name}`")]
    DuplicateLabel { name: String },
}
