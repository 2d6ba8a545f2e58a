//! Trace event types consumed by the transpiler.
//!
//! The tracer delivers an owned `(Vec<EvmStep>, ExecutionState)` per traced
//! transaction; the transpiler folds over the steps in order. Stack
//! snapshots are top of stack first.

use crate::opcode::EvmOpcode;
use serde::{Deserialize, Serialize};
use zevm_primitives::Word256;

/// The simulated EVM stack at one point in time, top of stack first.
pub type StackSnapshot = Vec<Word256>;

/// One captured EVM execution step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmStep {
    /// The opcode this step executed.
    pub opcode: EvmOpcode,
    /// PUSHn immediate bytes; empty for everything else.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub immediate_args: Vec<u8>,
    /// EVM stack at the start of this step, top first.
    pub stack_before: StackSnapshot,
    /// Call depth the tracer observed for this step.
    pub call_depth: u32,
    /// Synthetic marker injected by the tracer right after a nested call
    /// returns; `result` then carries the call's success flag.
    #[serde(default)]
    pub is_stack_restore: bool,
    /// Success flag of the returned call (1 success, 0 failure). Only
    /// meaningful when `is_stack_restore` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Word256>,
}

impl EvmStep {
    /// A plain opcode step.
    pub fn new(opcode: EvmOpcode, stack_before: StackSnapshot, call_depth: u32) -> Self {
        Self {
            opcode,
            immediate_args: Vec::new(),
            stack_before,
            call_depth,
            is_stack_restore: false,
            result: None,
        }
    }

    /// A PUSHn step carrying its immediate.
    pub fn push(
        opcode: EvmOpcode,
        immediate_args: Vec<u8>,
        stack_before: StackSnapshot,
        call_depth: u32,
    ) -> Self {
        Self {
            opcode,
            immediate_args,
            stack_before,
            call_depth,
            is_stack_restore: false,
            result: None,
        }
    }

    /// The synthetic stack-restore step, carrying the inner call's result.
    pub fn stack_restore(success: bool, call_depth: u32) -> Self {
        Self {
            opcode: EvmOpcode::Stop,
            immediate_args: Vec::new(),
            stack_before: Vec::new(),
            call_depth,
            is_stack_restore: true,
            result: Some(Word256::from_u64(success as u64)),
        }
    }
}

/// Execution context captured once per traced transaction.
///
/// Context-accessor opcodes (`CALLVALUE`, `CALLER`, `TIMESTAMP`, ...) are
/// materialized from this snapshot rather than recomputed per step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub call_value: Word256,
    #[serde(with = "serde_bytes_hex")]
    pub call_data: Vec<u8>,
    /// Code of the executing contract.
    #[serde(with = "serde_bytes_hex")]
    pub code: Vec<u8>,
    /// Executing contract address, zero-extended to 256 bits.
    pub address: Word256,
    pub caller: Word256,
    pub origin: Word256,
    pub coinbase: Word256,
    pub timestamp: Word256,
    pub chain_id: Word256,
    pub block_number: Word256,
    /// Remaining gas at snapshot time.
    pub gas: Word256,
    /// Deployed code sizes by address (hex key), consulted by `EXTCODESIZE`.
    #[serde(default)]
    pub code_sizes: std::collections::BTreeMap<String, u64>,
}

impl ExecutionState {
    /// Record a deployed code size for `EXTCODESIZE` lookups.
    pub fn set_code_size(&mut self, address: Word256, size: u64) {
        self.code_sizes.insert(address.to_hex(), size);
    }

    /// Deployed code size for an address, if known.
    pub fn code_size_of(&self, address: &Word256) -> Option<u64> {
        self.code_sizes.get(&address.to_hex()).copied()
    }
}

/// Hex-string serialization for byte blobs, so trace files stay readable.
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text.strip_prefix("0x").unwrap_or(&text);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_json_roundtrip() {
        let step = EvmStep::push(
            EvmOpcode::Push(2),
            vec![0x27, 0x10],
            vec![Word256::from_u64(5)],
            1,
        );
        let json = serde_json::to_string(&step).unwrap();
        let back: EvmStep = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_state_json_roundtrip_keeps_bytes() {
        let mut state = ExecutionState {
            call_data: vec![0xDE, 0xAD],
            code: vec![0x60, 0x42],
            ..Default::default()
        };
        state.set_code_size(Word256::from_u64(0x2222), 64);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("0xdead"));
        let back: ExecutionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.code_size_of(&Word256::from_u64(0x2222)), Some(64));
    }

    #[test]
    fn test_stack_restore_carries_flag() {
        let step = EvmStep::stack_restore(true, 1);
        assert!(step.is_stack_restore);
        assert_eq!(step.result, Some(Word256::from_u64(1)));
        assert!(step.stack_before.is_empty());
    }
}
