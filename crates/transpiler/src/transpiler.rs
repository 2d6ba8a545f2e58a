//! The EVM-trace to RISC-V transpiler core.
//!
//! One transpiler instance covers one transpile unit (a transaction or a
//! whole block). It folds over the ordered trace, appending a block of
//! RISC-V instructions per EVM step, and accumulates the data section and
//! per-transaction storage bindings as it goes. `to_assembly` consumes it.
//!
//! # Simulated execution model
//!
//! The emitted program keeps the EVM operand stack in memory, one 32-byte
//! slot per value, growing downward through the native `sp`:
//!
//! - `sp`  — top of the simulated operand stack
//! - `s2`  — outer (host) stack pointer, restored at exit and at
//!   transaction boundaries
//! - `s3`  — base of the current call frame's operand stack
//! - `s1`  — call-context stack pointer; `(sp, s3)` pairs are saved here
//!   across nested calls
//!
//! Every step's emission ends with an `ebreak` sentinel the differential
//! harness samples on, except terminal opcodes (which either end the
//! program or collapse the inner frame with a single explicit sentinel) and
//! `STOP`, which emits nothing at all.

use crate::assembly::{AssemblyFile, Instruction, BREAKPOINT};
use crate::data_section::DataSection;
use crate::debug::EvmToRiscvMapping;
use crate::error::{Result, TranspilerError};
use crate::opcode::EvmOpcode;
use crate::step::{EvmStep, ExecutionState, StackSnapshot};
use crate::storage::{StorageKind, StorageSection};
use tracing::debug;
use zevm_primitives::Word256;

/// Bytes reserved for a nested call's operand stack frame.
const CALL_FRAME_BYTES: u32 = 1024;

/// Bytes per simulated stack slot.
const SLOT: u32 = 32;

/// Transpiler feature toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranspilerConfig {
    /// Skip the per-call frame save/allocate protocol; nested calls then
    /// share the caller's operand stack. Debug aid only: differential
    /// snapshots of nested traces will not line up in this mode.
    pub disable_call_context_separation: bool,
    /// Source the 256-bit arithmetic opcodes from the trace oracle instead
    /// of calling the helper library. Used to bisect suspected helper
    /// miscompiles on a given toolchain.
    pub disable_host_optimized_opcodes: bool,
    /// Reject `MCOPY` (pre-Cancun target toolchains).
    pub disable_mcopy: bool,
    /// Skip recording per-step debug mappings.
    pub disable_debug_mappings: bool,
}

/// EVM-trace to RISC-V transpiler.
pub struct Transpiler {
    config: TranspilerConfig,
    instructions: Vec<Instruction>,
    data: DataSection,
    storage: StorageSection,
    call_depth: u32,
    steps_processed: usize,
    mappings: Vec<EvmToRiscvMapping>,
}

impl Transpiler {
    pub fn new(config: TranspilerConfig) -> Self {
        Self {
            config,
            instructions: Vec::new(),
            data: DataSection::new(),
            storage: StorageSection::new(),
            call_depth: 0,
            steps_processed: 0,
            mappings: Vec::new(),
        }
    }

    /// Current call depth (for tests and diagnostics).
    pub fn call_depth(&self) -> u32 {
        self.call_depth
    }

    /// Debug mappings recorded so far.
    pub fn mappings(&self) -> &[EvmToRiscvMapping] {
        &self.mappings
    }

    /// Write the debug mappings to a JSON file.
    pub fn save_debug_mappings(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        crate::debug::save_mappings(path, &self.mappings)
    }

    /// Drive [`Self::add_instruction`] over a whole trace. For each step the
    /// next step's `stack_before` is passed as the oracle hint.
    ///
    /// Returns the expected simulated-stack contents for every emitted
    /// `ebreak`, in order: the sequence the differential harness compares
    /// its samples against.
    pub fn process_execution(
        &mut self,
        steps: &[EvmStep],
        state: &ExecutionState,
    ) -> Result<Vec<StackSnapshot>> {
        let mut snapshots = Vec::new();
        for (i, step) in steps.iter().enumerate() {
            let hint = steps.get(i + 1).map(|next| next.stack_before.as_slice());
            let emitted_breakpoint = self.add_instruction(step, state, hint)?;
            if emitted_breakpoint {
                if let Some(next) = steps.get(i + 1) {
                    snapshots.push(next.stack_before.clone());
                }
            }
        }
        debug!(
            steps = steps.len(),
            instructions = self.instructions.len(),
            data_vars = self.data.len(),
            "processed execution trace"
        );
        Ok(snapshots)
    }

    /// Emit a prologue that resets the simulated stack pointer and frame
    /// base to the outer saved values and resets per-transaction storage
    /// state. The instruction stream and data section carry across.
    pub fn add_transaction_boundary(&mut self) {
        let before = self.instructions.len();
        self.emit(Instruction::new("mv", ["sp", "s2"]));
        self.emit(Instruction::new("mv", ["s3", "s2"]));
        self.storage.reset();
        self.call_depth = 0;
        self.record_mapping("TRANSACTION_BOUNDARY", before, self.data.len());
    }

    /// Consume the transpiler into its immutable output.
    pub fn to_assembly(self) -> AssemblyFile {
        AssemblyFile {
            instructions: self.instructions,
            data_section: self.data.iter().collect(),
        }
    }

    /// Translate a single step. Returns whether the step's emission ended
    /// with an `ebreak` sentinel.
    pub fn add_instruction(
        &mut self,
        step: &EvmStep,
        state: &ExecutionState,
        result_stack: Option<&[Word256]>,
    ) -> Result<bool> {
        let index = self.steps_processed;
        self.steps_processed += 1;
        let before = self.instructions.len();
        let data_before = self.data.len();

        if step.is_stack_restore {
            self.emit_stack_restore(step, index)?;
            self.record_mapping("STACK_RESTORE", before, data_before);
            return Ok(self.ends_with_breakpoint(before));
        }

        let op = step.opcode;
        self.check_arity(step, index)?;
        self.dispatch(op, step, state, result_stack, index)?;
        self.record_mapping(&op.mnemonic(), before, data_before);
        Ok(self.ends_with_breakpoint(before))
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    fn dispatch(
        &mut self,
        op: EvmOpcode,
        step: &EvmStep,
        state: &ExecutionState,
        result_stack: Option<&[Word256]>,
        index: usize,
    ) -> Result<()> {
        use EvmOpcode::*;

        match op {
            // -- terminators ------------------------------------------------
            Stop => return Ok(()), // no emission, no sentinel

            Return | Revert | Invalid => {
                for _ in 0..op.pops() {
                    self.emit_pop();
                }
                self.emit_terminal();
                return Ok(());
            }

            // -- 256-bit helper opcodes ------------------------------------
            Add => self.emit_helper_or_oracle("add256", op, result_stack, index)?,
            Mul => self.emit_helper_or_oracle("mul256", op, result_stack, index)?,
            Sub => self.emit_helper_or_oracle("sub256", op, result_stack, index)?,
            Div => self.emit_helper_or_oracle("div256", op, result_stack, index)?,
            And => self.emit_helper_or_oracle("and256", op, result_stack, index)?,
            Or => self.emit_helper_or_oracle("or256", op, result_stack, index)?,
            Xor => self.emit_helper_or_oracle("xor256", op, result_stack, index)?,
            Eq => self.emit_helper_or_oracle("eq256", op, result_stack, index)?,
            Lt => self.emit_helper_or_oracle("lt256", op, result_stack, index)?,
            Gt => self.emit_helper_or_oracle("gt256", op, result_stack, index)?,
            Slt => self.emit_helper_or_oracle("slt256", op, result_stack, index)?,
            Shr => self.emit_helper_or_oracle("shr256", op, result_stack, index)?,
            Shl => self.emit_helper_or_oracle("shl256", op, result_stack, index)?,

            Not => {
                if self.config.disable_host_optimized_opcodes {
                    self.emit_oracle(op, result_stack, index)?;
                } else {
                    self.emit_helper_unary("not256");
                }
            }

            IsZero => {
                if self.config.disable_host_optimized_opcodes {
                    self.emit_oracle(op, result_stack, index)?;
                } else {
                    // Push an inline zero, then compare: net stack delta 0.
                    self.emit_push_inline(0);
                    self.emit_helper_binary("eq256");
                }
            }

            // -- oracle-sourced opcodes ------------------------------------
            SDiv | Mod | SMod | AddMod | MulMod | Exp | SignExtend | Sar | Sgt | Byte
            | Keccak256 | MLoad | Balance | BlockHash | Difficulty | GasLimit | SelfBalance
            | BaseFee | BlobHash | BlobBaseFee | GasPrice | Pc | MSize | ExtCodeHash
            | ReturnDataSize | Create | Create2 => {
                self.emit_oracle(op, result_stack, index)?;
            }

            ExtCodeSize => {
                let address = step.stack_before[0];
                self.emit_pop();
                match state.code_size_of(&address) {
                    Some(size) => self.emit_constant(Word256::from_u64(size)),
                    None => {
                        let value = self.oracle_value(op, result_stack, index)?;
                        self.emit_constant(value);
                    }
                }
            }

            // -- stack manipulation ----------------------------------------
            Pop => self.emit_pop(),

            Push(n) => {
                let value = Word256::from_be_slice(&step.immediate_args);
                if n <= 4 {
                    self.emit_push_inline(value.low_u64() as u32);
                } else {
                    self.emit_constant(value);
                }
            }

            Dup(n) => self.emit_dup(n as u32),
            Swap(n) => self.emit_swap(n as u32),

            // -- context accessors -----------------------------------------
            CallValue => self.emit_constant(state.call_value),
            Gas => self.emit_constant(state.gas),
            Address => self.emit_constant(state.address),
            Caller => self.emit_constant(state.caller),
            Origin => self.emit_constant(state.origin),
            Coinbase => self.emit_constant(state.coinbase),
            Timestamp => self.emit_constant(state.timestamp),
            ChainId => self.emit_constant(state.chain_id),
            Number => self.emit_constant(state.block_number),
            CallDataSize => self.emit_constant(Word256::from_u64(state.call_data.len() as u64)),
            CodeSize => self.emit_constant(Word256::from_u64(state.code.len() as u64)),

            CallDataLoad => {
                let offset = step.stack_before[0];
                self.emit_pop();
                self.emit_constant(calldata_word(&state.call_data, &offset));
            }

            // -- shallow memory/log opcodes: operands consumed, effect
            //    elided (MLOAD is oracle-sourced above) --------------------
            CallDataCopy | CodeCopy | ReturnDataCopy | ExtCodeCopy | MStore | MStore8
            | Log(_) => {
                for _ in 0..op.pops() {
                    self.emit_pop();
                }
            }

            MCopy => {
                if self.config.disable_mcopy {
                    return Err(TranspilerError::UnsupportedOpcode {
                        opcode: op.mnemonic(),
                        index,
                    });
                }
                for _ in 0..op.pops() {
                    self.emit_pop();
                }
            }

            // -- control flow ----------------------------------------------
            // Jump targets are internal to the trace: execution order is
            // already authoritative, so only the operands are consumed.
            Jump => self.emit_pop(),
            JumpI => {
                self.emit_pop();
                self.emit_pop();
            }
            JumpDest => self.emit(Instruction::bare("nop")),

            // -- storage ---------------------------------------------------
            SStore => self.emit_store(StorageKind::Persistent, step),
            SLoad => self.emit_load(StorageKind::Persistent, step),
            TStore => self.emit_store(StorageKind::Transient, step),
            TLoad => self.emit_load(StorageKind::Transient, step),

            // -- nested calls ----------------------------------------------
            Call | CallCode | DelegateCall | StaticCall => {
                for _ in 0..op.pops() {
                    self.emit_pop();
                }
                if !self.config.disable_call_context_separation {
                    self.emit(Instruction::new("addi", ["s1", "s1", "-8"]));
                    self.emit(Instruction::new("sw", ["sp", "0(s1)"]));
                    self.emit(Instruction::new("sw", ["s3", "4(s1)"]));
                    let frame = format!("-{CALL_FRAME_BYTES}");
                    self.emit(Instruction::new("addi", ["sp", "sp", &frame]));
                    self.emit(Instruction::new("mv", ["s3", "sp"]));
                }
                self.call_depth += 1;
            }
        }

        self.emit_breakpoint();
        Ok(())
    }

    fn emit_stack_restore(&mut self, step: &EvmStep, index: usize) -> Result<()> {
        if self.call_depth == 0 {
            return Err(TranspilerError::MalformedTrace {
                opcode: "STACK_RESTORE".to_string(),
                index,
                message: "stack restore at call depth 0".to_string(),
            });
        }
        if !self.config.disable_call_context_separation {
            self.emit(Instruction::new("lw", ["sp", "0(s1)"]));
            self.emit(Instruction::new("lw", ["s3", "4(s1)"]));
            self.emit(Instruction::new("addi", ["s1", "s1", "8"]));
        }
        let success = step.result.map(|w| !w.is_zero()).unwrap_or(false);
        self.emit_push_inline(success as u32);
        self.emit_breakpoint();
        self.call_depth -= 1;
        Ok(())
    }

    /// RETURN/REVERT/INVALID body after operand pops: inside a nested call,
    /// collapse the inner frame and leave one explicit sentinel; at the
    /// outermost level restore the outer stack pointer and end silently.
    fn emit_terminal(&mut self) {
        if self.call_depth > 0 {
            if !self.config.disable_call_context_separation {
                self.emit(Instruction::new("mv", ["sp", "s3"]));
            }
            self.emit_breakpoint();
        } else {
            self.emit(Instruction::new("mv", ["sp", "s2"]));
        }
    }

    // ---------------------------------------------------------------------
    // Emission building blocks
    // ---------------------------------------------------------------------

    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn emit_breakpoint(&mut self) {
        self.emit(Instruction::bare(BREAKPOINT));
    }

    fn emit_pop(&mut self) {
        self.emit(Instruction::new("addi", ["sp", "sp", "32"]));
    }

    /// Push a small inline constant: allocate a slot, zero all eight limbs,
    /// store the value in the least significant one.
    fn emit_push_inline(&mut self, value: u32) {
        self.emit(Instruction::new("addi", ["sp", "sp", "-32"]));
        for offset in (0..SLOT - 4).step_by(4) {
            let dst = format!("{offset}(sp)");
            self.emit(Instruction::new("sw", ["zero", &dst]));
        }
        if value == 0 {
            self.emit(Instruction::new("sw", ["zero", "28(sp)"]));
        } else {
            let imm = value.to_string();
            self.emit(Instruction::new("li", ["t0", &imm]));
            self.emit(Instruction::new("sw", ["t0", "28(sp)"]));
        }
    }

    /// Intern a constant and push it from the data section.
    fn emit_constant(&mut self, value: Word256) {
        let symbol = self.data.add(value);
        self.emit_data_load(&symbol);
    }

    /// Push the 32-byte constant behind `symbol` onto the simulated stack.
    fn emit_data_load(&mut self, symbol: &str) {
        self.emit(Instruction::new("addi", ["sp", "sp", "-32"]));
        self.emit(Instruction::new("la", ["t0", symbol]));
        for i in 0..8u32 {
            let src = format!("{}(t0)", i * 4);
            let dst = format!("{}(sp)", i * 4);
            self.emit(Instruction::new("lw", ["t1", &src]));
            self.emit(Instruction::new("sw", ["t1", &dst]));
        }
    }

    fn emit_helper_or_oracle(
        &mut self,
        routine: &str,
        op: EvmOpcode,
        result_stack: Option<&[Word256]>,
        index: usize,
    ) -> Result<()> {
        if self.config.disable_host_optimized_opcodes {
            self.emit_oracle(op, result_stack, index)
        } else {
            self.emit_helper_binary(routine);
            Ok(())
        }
    }

    /// Binary helper call: the routine reads the top two slots and writes
    /// the result over the older one; the younger slot is then dropped.
    fn emit_helper_binary(&mut self, routine: &str) {
        self.emit(Instruction::new("addi", ["a0", "sp", "0"]));
        self.emit(Instruction::new("addi", ["a1", "sp", "32"]));
        self.emit(Instruction::new("call", [routine]));
        self.emit(Instruction::new("addi", ["sp", "sp", "32"]));
    }

    /// Unary helper call rewriting the top slot in place; no pop.
    fn emit_helper_unary(&mut self, routine: &str) {
        self.emit(Instruction::new("addi", ["a0", "sp", "0"]));
        self.emit(Instruction::new("call", [routine]));
    }

    /// Pop the opcode's operands and push its post-step value read from the
    /// trace oracle (the next step's top of stack).
    fn emit_oracle(
        &mut self,
        op: EvmOpcode,
        result_stack: Option<&[Word256]>,
        index: usize,
    ) -> Result<()> {
        let value = self.oracle_value(op, result_stack, index)?;
        for _ in 0..op.pops() {
            self.emit_pop();
        }
        self.emit_constant(value);
        Ok(())
    }

    fn oracle_value(
        &self,
        op: EvmOpcode,
        result_stack: Option<&[Word256]>,
        index: usize,
    ) -> Result<Word256> {
        result_stack
            .and_then(|stack| stack.first().copied())
            .ok_or_else(|| TranspilerError::MissingOracleValue {
                opcode: op.mnemonic(),
                index,
            })
    }

    /// DUPn: copy the n-th slot (1-based from the top) into a new top slot.
    fn emit_dup(&mut self, n: u32) {
        self.emit(Instruction::new("addi", ["sp", "sp", "-32"]));
        for i in 0..8u32 {
            let src = format!("{}(sp)", SLOT * n + i * 4);
            let dst = format!("{}(sp)", i * 4);
            self.emit(Instruction::new("lw", ["t0", &src]));
            self.emit(Instruction::new("sw", ["t0", &dst]));
        }
    }

    /// SWAPn: exchange the top slot with the (n+1)-th, limb by limb.
    fn emit_swap(&mut self, n: u32) {
        for i in 0..8u32 {
            let top = format!("{}(sp)", i * 4);
            let deep = format!("{}(sp)", SLOT * n + i * 4);
            self.emit(Instruction::new("lw", ["t0", &top]));
            self.emit(Instruction::new("lw", ["t1", &deep]));
            self.emit(Instruction::new("sw", ["t1", &top]));
            self.emit(Instruction::new("sw", ["t0", &deep]));
        }
    }

    fn emit_store(&mut self, kind: StorageKind, step: &EvmStep) {
        let key = step.stack_before[0];
        let value = step.stack_before[1];
        self.emit_pop();
        self.emit_pop();
        self.storage.store(kind, &key, value, &mut self.data);
    }

    fn emit_load(&mut self, kind: StorageKind, step: &EvmStep) {
        let key = step.stack_before[0];
        self.emit_pop();
        let symbol = self.storage.load(kind, &key, &mut self.data);
        self.emit_data_load(&symbol);
    }

    // ---------------------------------------------------------------------
    // Bookkeeping
    // ---------------------------------------------------------------------

    fn check_arity(&self, step: &EvmStep, index: usize) -> Result<()> {
        let needed = step.opcode.required_stack();
        if step.stack_before.len() < needed {
            return Err(TranspilerError::MalformedTrace {
                opcode: step.opcode.mnemonic(),
                index,
                message: format!(
                    "stack snapshot has {} values, opcode requires {}",
                    step.stack_before.len(),
                    needed
                ),
            });
        }
        Ok(())
    }

    fn ends_with_breakpoint(&self, before: usize) -> bool {
        self.instructions.len() > before
            && self
                .instructions
                .last()
                .is_some_and(Instruction::is_breakpoint)
    }

    fn record_mapping(&mut self, opcode: &str, instr_before: usize, data_before: usize) {
        if self.config.disable_debug_mappings {
            return;
        }
        self.mappings.push(EvmToRiscvMapping {
            evm_opcode: opcode.to_string(),
            riscv_instructions: self.instructions[instr_before..].to_vec(),
            data_variables: self.data.iter().skip(data_before).collect(),
            call_depth: self.call_depth,
        });
    }
}

/// The 32-byte calldata window starting at `offset`, zero-padded past the
/// end (EVM `CALLDATALOAD` semantics; the byte at `offset` becomes the most
/// significant).
fn calldata_word(call_data: &[u8], offset: &Word256) -> Word256 {
    let mut buf = [0u8; 32];
    if let Some(off) = offset.to_usize() {
        if off < call_data.len() {
            let end = (off + 32).min(call_data.len());
            buf[..end - off].copy_from_slice(&call_data[off..end]);
        }
    }
    Word256::from_be_bytes(buf)
}
