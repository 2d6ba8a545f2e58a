//! Per-step EVM-to-RISC-V mappings for failure bisection.
//!
//! When a block proves fine in the emulator but the zkVM toolchain rejects
//! it, the mapping log localizes the offending EVM step: the bisection tool
//! rebuilds the assembly for successively shorter prefixes of the mapping
//! list and re-proves each one.

use crate::assembly::{AssemblyFile, Instruction};
use crate::data_section::DataVariable;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// One EVM step's emission record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvmToRiscvMapping {
    /// Mnemonic of the EVM opcode (or a synthetic marker such as
    /// `STACK_RESTORE` / `TRANSACTION_BOUNDARY`).
    pub evm_opcode: String,
    /// Instructions emitted for this step, in order.
    pub riscv_instructions: Vec<Instruction>,
    /// Data-section constants first interned during this step.
    pub data_variables: Vec<DataVariable>,
    /// Call depth at the time the step was processed.
    pub call_depth: u32,
}

/// Write mappings as pretty JSON.
pub fn save_mappings(path: impl AsRef<Path>, mappings: &[EvmToRiscvMapping]) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), mappings)?;
    Ok(())
}

/// Read mappings back from JSON.
pub fn load_mappings(path: impl AsRef<Path>) -> Result<Vec<EvmToRiscvMapping>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Rebuild an assembly file from the mapping prefix `0..=end`.
///
/// Data variables are collected in first-use order, so symbol references in
/// the truncated instruction stream always resolve.
pub fn assembly_from_prefix(mappings: &[EvmToRiscvMapping], end: usize) -> AssemblyFile {
    let mut instructions = Vec::new();
    let mut data_section: Vec<DataVariable> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for mapping in mappings.iter().take(end + 1) {
        instructions.extend(mapping.riscv_instructions.iter().cloned());
        for var in &mapping.data_variables {
            if seen.insert(var.name.clone()) {
                data_section.push(var.clone());
            }
        }
    }

    AssemblyFile {
        instructions,
        data_section,
    }
}
