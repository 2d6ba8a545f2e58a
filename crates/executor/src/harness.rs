//! Differential execution harness.
//!
//! Runs an emitted program on the RV32IM emulator and samples the simulated
//! EVM stack at every `ebreak`, producing the per-step snapshot sequence the
//! transpiler tests compare against the EVM trace.
//!
//! Register conventions mirror the emitted prologue: `sp` starts at
//! [`STACK_TOP`], `s3` tracks the current call frame base and `s1` the
//! context stack pointer. A stack sample reads the window `[sp, s3)` as
//! 32-byte slots, most significant word at the lowest address, top of stack
//! first.

use crate::asm::assemble;
use crate::cpu::{reg, Cpu, StepOutcome};
use crate::error::ExecutorError;
use tracing::debug;
use zevm_primitives::{Word256, LIMBS, WORD_BYTES};

/// Initial simulated stack pointer (top of the operand stack region).
pub const STACK_TOP: u32 = 0x7fff_fff0;

/// Top of the auxiliary call-context stack.
pub const CONTEXT_STACK_TOP: u32 = 0x6fff_0000;

/// Returning here ends the program (the harness preloads it into `ra`).
pub const HALT_ADDR: u32 = 0;

/// Harness configuration.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Upper bound on retired instructions before giving up.
    pub max_steps: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_steps: 50_000_000,
        }
    }
}

/// Result of a harness run.
#[derive(Debug)]
pub struct ExecutionReport {
    /// One simulated-stack sample per executed `ebreak`, top of stack first.
    pub stack_snapshots: Vec<Vec<Word256>>,
    /// Retired instruction count.
    pub steps_executed: u64,
}

/// Assembles and executes emitted programs.
#[derive(Debug, Default)]
pub struct VmRunner {
    config: VmConfig,
}

impl VmRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self { config }
    }

    /// Assemble `assembly` (debug-mode text, `ebreak`s included) and run it
    /// to completion, collecting a stack sample at every breakpoint.
    pub fn execute(&self, assembly: &str) -> Result<ExecutionReport, ExecutorError> {
        let program = assemble(assembly)?;
        debug!(
            text_bytes = program.text.len(),
            data_bytes = program.data.len(),
            entry = format_args!("{:#x}", program.entry),
            "assembled program"
        );

        let mut cpu = Cpu::new();
        cpu.memory.load_image(program.text_base, &program.text);
        cpu.memory.load_image(program.data_base, &program.data);
        cpu.pc = program.entry;
        cpu.set_reg(reg::RA, HALT_ADDR);
        cpu.set_reg(reg::SP, STACK_TOP);
        // The emitted prologue re-derives these, but raw helper-library test
        // programs rely on the harness presets, exactly like the original
        // emulator harness programmed them externally.
        cpu.set_reg(reg::S3, STACK_TOP);
        cpu.set_reg(reg::S1, CONTEXT_STACK_TOP);
        cpu.set_halt_addr(HALT_ADDR);

        let mut snapshots = Vec::new();
        loop {
            if cpu.cycle >= self.config.max_steps {
                return Err(ExecutorError::MaxStepsReached {
                    max_steps: self.config.max_steps,
                });
            }
            match cpu.step()? {
                StepOutcome::Continue => {}
                StepOutcome::Breakpoint => {
                    snapshots.push(sample_stack(&cpu)?);
                    cpu.skip_breakpoint();
                }
                StepOutcome::Halted => break,
            }
        }

        Ok(ExecutionReport {
            stack_snapshots: snapshots,
            steps_executed: cpu.cycle,
        })
    }
}

/// Read the simulated EVM stack window `[sp, s3)` as 256-bit slots, top of
/// stack first.
fn sample_stack(cpu: &Cpu) -> Result<Vec<Word256>, ExecutorError> {
    let sp = cpu.get_reg(reg::SP);
    let base = match cpu.get_reg(reg::S3) {
        0 => STACK_TOP,
        b => b,
    };
    if sp > base {
        return Err(ExecutorError::InvalidStackWindow { sp, base });
    }

    let entries = (base - sp) as usize / WORD_BYTES;
    let mut stack = Vec::with_capacity(entries);
    for slot in 0..entries {
        let slot_addr = sp + (slot * WORD_BYTES) as u32;
        let mut limbs = [0u32; LIMBS];
        for (i, limb) in limbs.iter_mut().enumerate() {
            *limb = cpu.memory.read_u32(slot_addr + (i * 4) as u32)?;
        }
        stack.push(Word256::from_limbs(limbs));
    }
    Ok(stack)
}
