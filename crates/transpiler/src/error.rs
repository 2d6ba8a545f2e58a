//! Transpiler errors.
//!
//! All trace-level failures are fatal for the transpile unit: the trace is
//! deterministic, so retrying would hit the same failure, and nothing from
//! the partial work is emitted.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranspilerError {
    #[error("unsupported opcode {opcode} at step {index}")]
    UnsupportedOpcode { opcode: String, index: usize },

    #[error("missing oracle value for {opcode} at step {index}: no next stack snapshot")]
    MissingOracleValue { opcode: String, index: usize },

    #[error("malformed trace at step {index} ({opcode}): {message}")]
    MalformedTrace {
        opcode: String,
        index: usize,
        message: String,
    },

    #[error("emitted assembly rejected by the toolchain: {0}")]
    AssemblyEmission(String),

    #[error("debug mapping serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TranspilerError>;
