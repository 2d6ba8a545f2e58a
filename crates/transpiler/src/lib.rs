//! zevm-transpiler: EVM execution-trace to RISC-V assembly transpiler.
//!
//! The core of the proving pipeline: a concrete EVM execution trace (one
//! step per executed opcode, with stack snapshots) is lowered to a
//! self-contained RV32IM program that replays the same stack effects on a
//! simulated, memory-resident EVM stack. The program is handed to an
//! external zkVM toolchain, which proves the deterministic RISC-V run.
//!
//! Hard-to-recompute values (`KECCAK256`, `BALANCE`, ...) are read from the
//! trace itself — the next step's stack snapshot — and interned as
//! constants. The proof therefore covers the RISC-V execution that consumes
//! those values, not their independent recomputation; a verifier wanting
//! stronger guarantees must check the trace separately.

pub mod assembly;
pub mod data_section;
pub mod debug;
pub mod error;
pub mod opcode;
pub mod step;
pub mod storage;
pub mod trace_builder;
pub mod transpiler;

pub use assembly::{AssemblyFile, Instruction, CONTEXT_STACK_TOP, UINT256_LIBRARY};
pub use data_section::{DataSection, DataVariable};
pub use debug::{assembly_from_prefix, load_mappings, save_mappings, EvmToRiscvMapping};
pub use error::{Result, TranspilerError};
pub use opcode::EvmOpcode;
pub use step::{EvmStep, ExecutionState, StackSnapshot};
pub use storage::{StorageKind, StorageSection};
pub use trace_builder::TraceBuilder;
pub use transpiler::{Transpiler, TranspilerConfig};
