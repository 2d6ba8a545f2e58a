//! revm inspector capturing per-opcode EVM steps.

use revm::{
    interpreter::{
        interpreter::EthInterpreter, interpreter_types::Jumps, CallInputs, CallOutcome,
        CreateInputs, CreateOutcome, Interpreter,
    },
    primitives::U256,
    Inspector,
};
use std::collections::VecDeque;
use zevm_primitives::Word256;
use zevm_transpiler::{EvmOpcode, EvmStep};

fn to_word(value: &U256) -> Word256 {
    Word256::from_be_bytes(value.to_be_bytes::<32>())
}

/// Captures the opcode stream with stack snapshots, one step per executed
/// instruction, and synthesizes the stack-restore marker when a nested call
/// frame returns.
///
/// Steps executed inside `CREATE`/`CREATE2` constructor frames are not
/// captured: the transpiler models those opcodes through the trace oracle
/// (the created address appears on the caller's stack), so constructor
/// execution stays invisible.
#[derive(Default)]
pub struct StepInspector {
    steps: Vec<EvmStep>,
    /// Active call frames (1 while in the top-level call).
    frames: u32,
    /// Depth of nested constructor frames being skipped.
    create_frames: u32,
    /// Success flags of returned frames, flushed before the next step.
    pending_restores: VecDeque<bool>,
    /// First opcode byte we could not map, if any.
    unknown_opcode: Option<u8>,
}

impl StepInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish the capture: fill PUSH immediates (derived from the value the
    /// push left on the next step's stack) and hand out the steps.
    ///
    /// Returns the first unmappable opcode byte as an error.
    pub fn finish(mut self) -> crate::Result<Vec<EvmStep>> {
        if let Some(byte) = self.unknown_opcode {
            return Err(crate::TracerError::UnknownOpcode { byte });
        }
        // A frame return with no caller step after it (the call was the
        // caller's last instruction) still owes its restore marker.
        self.flush_restores();
        for i in 0..self.steps.len() {
            let width = self.steps[i].opcode.immediate_len();
            if width == 0 || !self.steps[i].immediate_args.is_empty() {
                continue;
            }
            let pushed = self
                .steps
                .get(i + 1)
                .and_then(|next| next.stack_before.first().copied())
                .unwrap_or(Word256::ZERO);
            let bytes = pushed.to_be_bytes();
            self.steps[i].immediate_args = bytes[32 - width..].to_vec();
        }
        Ok(self.steps)
    }

    fn flush_restores(&mut self) {
        while let Some(success) = self.pending_restores.pop_front() {
            let depth = self.frames; // the returned frame's depth
            self.steps.push(EvmStep {
                opcode: EvmOpcode::Stop,
                immediate_args: Vec::new(),
                stack_before: Vec::new(),
                call_depth: depth,
                is_stack_restore: true,
                result: Some(Word256::from_u64(success as u64)),
            });
        }
    }
}

impl<CTX, EXT> Inspector<CTX, EthInterpreter<EXT>> for StepInspector {
    fn step(&mut self, interp: &mut Interpreter<EthInterpreter<EXT>>, _context: &mut CTX) {
        if self.create_frames > 0 || self.unknown_opcode.is_some() {
            return;
        }
        self.flush_restores();

        let byte = interp.bytecode.opcode();
        let Some(opcode) = EvmOpcode::from_byte(byte) else {
            self.unknown_opcode = Some(byte);
            return;
        };

        // revm exposes the stack bottom-first; steps carry it top-first.
        let stack_before: Vec<Word256> =
            interp.stack.data().iter().rev().map(to_word).collect();

        self.steps.push(EvmStep {
            opcode,
            // Filled in finish(): the immediate equals the pushed value.
            immediate_args: Vec::new(),
            stack_before,
            call_depth: self.frames.saturating_sub(1),
            is_stack_restore: false,
            result: None,
        });
    }

    fn call(&mut self, _context: &mut CTX, _inputs: &mut CallInputs) -> Option<CallOutcome> {
        if self.create_frames == 0 {
            self.frames += 1;
        }
        None
    }

    fn call_end(&mut self, _context: &mut CTX, _inputs: &CallInputs, outcome: &mut CallOutcome) {
        if self.create_frames > 0 {
            return;
        }
        self.frames = self.frames.saturating_sub(1);
        if self.frames >= 1 {
            self.pending_restores
                .push_back(outcome.instruction_result().is_ok());
        }
    }

    fn create(&mut self, _context: &mut CTX, _inputs: &mut CreateInputs) -> Option<CreateOutcome> {
        self.create_frames += 1;
        None
    }

    fn create_end(
        &mut self,
        _context: &mut CTX,
        _inputs: &CreateInputs,
        _outcome: &mut CreateOutcome,
    ) {
        self.create_frames = self.create_frames.saturating_sub(1);
    }
}
