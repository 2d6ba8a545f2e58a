//! End-to-end tests through the real EVM: revm executes bytecode under the
//! step inspector, the captured trace is transpiled, and the emitted
//! program is run on the RV32IM emulator against the trace's snapshots.

use revm::primitives::{Address, U256};
use zevm_executor::VmRunner;
use zevm_primitives::Word256;
use zevm_tracer::{transpile_block, TraceRunner, TracerConfig};
use zevm_transpiler::{EvmOpcode, EvmStep, ExecutionState, Transpiler, TranspilerConfig};

// A few mnemonic byte constants keep the test bytecode readable.
const PUSH0: u8 = 0x5F;
const PUSH1: u8 = 0x60;
const PUSH2: u8 = 0x61;
const PUSH20: u8 = 0x73;
const ADD: u8 = 0x01;
const MSTORE: u8 = 0x52;
const MLOAD: u8 = 0x51;
const SSTORE: u8 = 0x55;
const SLOAD: u8 = 0x54;
const CALL: u8 = 0xF1;
const RETURN: u8 = 0xF3;
const REVERT: u8 = 0xFD;
const STOP: u8 = 0x00;
const POP: u8 = 0x50;

fn target() -> Address {
    Address::with_last_byte(0x42)
}

fn trace(code: &[u8]) -> (Vec<EvmStep>, ExecutionState) {
    let mut runner = TraceRunner::new(TracerConfig::default());
    runner.deploy_contract(target(), code.to_vec(), U256::from(1000));
    runner
        .execute(target(), Vec::new(), U256::ZERO)
        .expect("trace")
}

fn assert_differential(steps: &[EvmStep], state: &ExecutionState) {
    let mut transpiler = Transpiler::new(TranspilerConfig::default());
    let expected = transpiler.process_execution(steps, state).expect("transpile");
    let assembly = transpiler.to_assembly();
    let report = VmRunner::new()
        .execute(&assembly.to_debug_assembly())
        .expect("emulate");
    assert_eq!(report.stack_snapshots, expected);
}

#[test]
fn test_add_program_trace_shape() {
    let (steps, _) = trace(&[PUSH1, 0x02, PUSH1, 0x03, ADD, STOP]);
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0].opcode, EvmOpcode::Push(1));
    assert_eq!(steps[0].immediate_args, vec![0x02]);
    assert_eq!(steps[1].immediate_args, vec![0x03]);
    assert_eq!(steps[2].opcode, EvmOpcode::Add);
    assert_eq!(
        steps[2].stack_before,
        vec![Word256::from_u64(3), Word256::from_u64(2)]
    );
    assert_eq!(steps[3].stack_before, vec![Word256::from_u64(5)]);
}

#[test]
fn test_add_program_differential() {
    let (steps, state) = trace(&[PUSH1, 0x42, PUSH1, 0x01, ADD, STOP]);
    assert_differential(&steps, &state);
}

#[test]
fn test_mstore_mload_differential() {
    // MSTORE is elided; the MLOAD result is served by the trace oracle and
    // must round-trip through the data section.
    let (steps, state) = trace(&[
        PUSH1, 0x2A, PUSH0, MSTORE, PUSH0, MLOAD, POP, STOP,
    ]);
    let mload = steps
        .iter()
        .position(|s| s.opcode == EvmOpcode::MLoad)
        .unwrap();
    assert_eq!(
        steps[mload + 1].stack_before,
        vec![Word256::from_u64(0x2A)]
    );
    assert_differential(&steps, &state);
}

#[test]
fn test_sstore_sload_differential() {
    let (steps, state) = trace(&[
        PUSH1, 0x42, PUSH0, SSTORE, PUSH0, SLOAD, POP, STOP,
    ]);
    assert_differential(&steps, &state);
}

fn call_contract(callee: Address, tail: &[u8]) -> Vec<u8> {
    // PUSH1 0xAA; <6 zero-ish args>; PUSH20 callee; PUSH2 gas; CALL; tail
    let mut code = vec![
        PUSH1, 0xAA, PUSH1, 0x20, PUSH0, PUSH0, PUSH0, PUSH0, PUSH20,
    ];
    code.extend_from_slice(callee.as_slice());
    code.extend_from_slice(&[PUSH2, 0x27, 0x10, CALL]);
    code.extend_from_slice(tail);
    code
}

#[test]
fn test_nested_call_success_differential() {
    let callee = Address::with_last_byte(0x22);
    let mut runner = TraceRunner::new(TracerConfig::default());
    runner.deploy_contract(callee, vec![PUSH1, 0xBB, PUSH0, PUSH0, RETURN], U256::ZERO);
    runner.deploy_contract(
        target(),
        call_contract(callee, &[PUSH1, 0xDD, STOP]),
        U256::from(1000),
    );
    let (steps, state) = runner
        .execute(target(), Vec::new(), U256::ZERO)
        .expect("trace");

    // The tracer injected exactly one stack-restore carrying success.
    let restores: Vec<&EvmStep> = steps.iter().filter(|s| s.is_stack_restore).collect();
    assert_eq!(restores.len(), 1);
    assert_eq!(restores[0].result, Some(Word256::from_u64(1)));

    assert_differential(&steps, &state);

    // The caller observes [0xDD, success, 0xAA] at the end.
    let last = steps.last().unwrap();
    assert_eq!(
        last.stack_before,
        vec![
            Word256::from_u64(0xDD),
            Word256::from_u64(1),
            Word256::from_u64(0xAA)
        ]
    );
}

#[test]
fn test_nested_call_revert_differential() {
    let callee = Address::with_last_byte(0x23);
    let mut runner = TraceRunner::new(TracerConfig::default());
    runner.deploy_contract(callee, vec![PUSH0, PUSH0, REVERT], U256::ZERO);
    runner.deploy_contract(
        target(),
        call_contract(callee, &[PUSH1, 0xDD, STOP]),
        U256::from(1000),
    );
    let (steps, state) = runner
        .execute(target(), Vec::new(), U256::ZERO)
        .expect("trace");

    let restore = steps.iter().find(|s| s.is_stack_restore).unwrap();
    assert_eq!(restore.result, Some(Word256::ZERO));
    assert_differential(&steps, &state);
}

#[tokio::test]
async fn test_parallel_block_tracing_and_transpile() {
    let programs: Vec<Vec<u8>> = vec![
        vec![PUSH1, 0x01, PUSH1, 0x02, ADD, STOP],
        vec![PUSH1, 0x42, PUSH0, SSTORE, STOP],
        vec![PUSH1, 0x07, POP, STOP],
    ];

    let jobs: Vec<_> = programs
        .into_iter()
        .map(|code| {
            move || {
                let mut runner = TraceRunner::new(TracerConfig::default());
                runner.deploy_contract(target(), code, U256::from(1000));
                runner.execute(target(), Vec::new(), U256::ZERO)
            }
        })
        .collect();

    let results = zevm_tracer::trace_transactions_parallel(jobs, 2).await;
    let traces: Vec<_> = results.into_iter().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(traces.len(), 3);

    let (assembly, expected) =
        transpile_block(&traces, TranspilerConfig::default()).expect("transpile block");
    let report = VmRunner::new()
        .execute(&assembly.to_debug_assembly())
        .expect("emulate block");
    assert_eq!(report.stack_snapshots, expected);
}
