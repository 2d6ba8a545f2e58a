//! zevm-tracer: EVM execution tracing for the transpiler.
//!
//! Wraps revm with an [`Inspector`](revm::Inspector) that captures one
//! [`EvmStep`](zevm_transpiler::EvmStep) per executed opcode — stack
//! snapshot included — and injects the synthetic stack-restore marker after
//! every nested call returns. The tracer returns an owned
//! `(Vec<EvmStep>, ExecutionState)` per transaction; the transpiler
//! consumes it by value.

pub mod block;
pub mod inspector;
pub mod runner;

pub use block::{trace_transactions_parallel, transpile_block, DEFAULT_TRACE_CONCURRENCY};
pub use inspector::StepInspector;
pub use runner::{trace_bytecode, TraceRunner, TracerConfig, DEFAULT_CONTRACT_ADDRESS};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("opcode byte {byte:#04x} has no assigned opcode")]
    UnknownOpcode { byte: u8 },

    #[error("transaction environment rejected: {0}")]
    TxBuild(String),

    #[error("EVM execution failed: {0}")]
    Execution(String),

    #[error("background trace task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, TracerError>;
