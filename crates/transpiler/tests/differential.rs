//! Differential tests: build a trace, transpile it, execute the emitted
//! program on the RV32IM emulator and compare the stack sampled at every
//! `ebreak` against the trace's own snapshots.

use zevm_executor::VmRunner;
use zevm_primitives::Word256;
use zevm_transpiler::{
    EvmOpcode, EvmStep, ExecutionState, StackSnapshot, TraceBuilder, Transpiler, TranspilerConfig,
};

/// Transpile and run a trace; assert per-`ebreak` stack equality and return
/// the sampled snapshots for extra assertions.
fn assert_differential(steps: &[EvmStep], state: &ExecutionState) -> Vec<StackSnapshot> {
    let mut transpiler = Transpiler::new(TranspilerConfig::default());
    let expected = transpiler
        .process_execution(steps, state)
        .expect("transpile");
    let assembly = transpiler.to_assembly();
    let report = VmRunner::new()
        .execute(&assembly.to_debug_assembly())
        .expect("execute emitted program");

    assert_eq!(
        report.stack_snapshots.len(),
        expected.len(),
        "sample count mismatch"
    );
    for (i, (sampled, wanted)) in report.stack_snapshots.iter().zip(&expected).enumerate() {
        assert_eq!(sampled, wanted, "stack mismatch at sentinel {i}");
    }
    report.stack_snapshots
}

fn run_builder(builder: TraceBuilder) -> Vec<StackSnapshot> {
    let (steps, state) = builder.build();
    assert_differential(&steps, &state)
}

#[test]
fn test_add_small() {
    let snapshots = run_builder(TraceBuilder::new().push1(0x42).push1(0x01).add().stop());
    assert_eq!(snapshots.len(), 3);
    assert_eq!(snapshots[0], vec![Word256::from_u64(0x42)]);
    assert_eq!(
        snapshots[1],
        vec![Word256::from_u64(0x01), Word256::from_u64(0x42)]
    );
    assert_eq!(snapshots[2], vec![Word256::from_u64(0x43)]);
}

#[test]
fn test_add_256_overflow() {
    let snapshots = run_builder(
        TraceBuilder::new()
            .push4(0xFFFF_FFFF)
            .push1(0x01)
            .add()
            .push4(0xFFFF_FFFF)
            .add()
            .stop(),
    );
    let last = snapshots.last().unwrap();
    assert_eq!(last, &vec![Word256::from_u64(0x1_FFFF_FFFF)]);
}

#[test]
fn test_not_zero() {
    let snapshots = run_builder(TraceBuilder::new().push0().not().stop());
    assert_eq!(snapshots.last().unwrap(), &vec![Word256::MAX]);
}

#[test]
fn test_sub_wraps_below_zero() {
    // top - second = 3 - 5
    let snapshots = run_builder(TraceBuilder::new().push1(5).push1(3).sub().stop());
    let mut expected = [0xFFu8; 32];
    expected[31] = 0xFE;
    assert_eq!(
        snapshots.last().unwrap(),
        &vec![Word256::from_be_bytes(expected)]
    );
}

#[test]
fn test_mul_cross_limb() {
    let snapshots = run_builder(
        TraceBuilder::new()
            .push32(Word256::from_u64(u64::MAX))
            .push32(Word256::from_u64(u64::MAX))
            .mul()
            .stop(),
    );
    assert_eq!(
        snapshots.last().unwrap(),
        &vec![Word256::from_hex("0xfffffffffffffffe0000000000000001").unwrap()]
    );
}

#[test]
fn test_div_including_by_zero() {
    let snapshots = run_builder(
        TraceBuilder::new()
            .push1(2)
            .push32(Word256::from_u64(0x1_FFFF_FFFF))
            .div()
            .push0()
            .swap(1)
            .div()
            .stop(),
    );
    // 0x1ffffffff / 2 = 0xffffffff, then x / 0 = 0
    assert_eq!(snapshots.last().unwrap(), &vec![Word256::ZERO]);
}

#[test]
fn test_bitwise_and_or_xor() {
    let a = Word256::from_hex("0xf0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0").unwrap();
    let b = Word256::from_hex("0xffff0000ffff0000ffff0000ffff0000").unwrap();
    let snapshots = run_builder(
        TraceBuilder::new()
            .push32(b)
            .push32(a)
            .and()
            .push32(b)
            .push32(a)
            .or()
            .push32(b)
            .push32(a)
            .xor()
            .stop(),
    );
    let last = snapshots.last().unwrap();
    assert_eq!(last.len(), 3);
    assert_eq!(
        last[0],
        Word256::from_hex("0x0f0ff0f00f0ff0f00f0ff0f00f0ff0f0").unwrap()
    );
    assert_eq!(
        last[1],
        Word256::from_hex("0xfffff0f0fffff0f0fffff0f0fffff0f0").unwrap()
    );
    assert_eq!(
        last[2],
        Word256::from_hex("0xf0f00000f0f00000f0f00000f0f00000").unwrap()
    );
}

#[test]
fn test_comparisons() {
    let snapshots = run_builder(
        TraceBuilder::new()
            .push1(5)
            .push1(3)
            .lt() // 3 < 5 -> 1
            .push1(5)
            .push1(3)
            .gt() // 3 > 5 -> 0
            .push1(7)
            .push1(7)
            .eq() // 1
            .stop(),
    );
    let last = snapshots.last().unwrap();
    assert_eq!(
        last,
        &vec![
            Word256::from_u64(1),
            Word256::from_u64(0),
            Word256::from_u64(1)
        ]
    );
}

#[test]
fn test_signed_comparison() {
    // -1 < 0 signed, but not unsigned
    let snapshots = run_builder(
        TraceBuilder::new()
            .push0()
            .push32(Word256::MAX)
            .slt() // -1 < 0 -> 1
            .push0()
            .push32(Word256::MAX)
            .lt() // MAX < 0 -> 0
            .stop(),
    );
    assert_eq!(
        snapshots.last().unwrap(),
        &vec![Word256::from_u64(0), Word256::from_u64(1)]
    );
}

#[test]
fn test_shifts_cross_limb_and_saturating() {
    let one = Word256::from_u64(1);
    let snapshots = run_builder(
        TraceBuilder::new()
            .push32(one)
            .push1(200)
            .shl() // 1 << 200
            .push1(100)
            .shr() // >> 100 -> 1 << 100
            .push2(0x0100)
            .shr() // shift of 256 -> 0
            .stop(),
    );
    assert_eq!(snapshots.last().unwrap(), &vec![Word256::ZERO]);
    // intermediate check: after the SHR by 100
    let mid = &snapshots[snapshots.len() - 3];
    let expected = {
        let mut bytes = [0u8; 32];
        bytes[31 - 12] = 0x10; // bit 100
        Word256::from_be_bytes(bytes)
    };
    assert_eq!(mid, &vec![expected]);
}

#[test]
fn test_iszero() {
    let snapshots = run_builder(
        TraceBuilder::new()
            .push0()
            .iszero()
            .push1(7)
            .iszero()
            .stop(),
    );
    assert_eq!(
        snapshots.last().unwrap(),
        &vec![Word256::from_u64(0), Word256::from_u64(1)]
    );
}

#[test]
fn test_dup_and_swap_move_all_limbs() {
    let wide = Word256::from_hex(
        "0x112233445566778899aabbccddeeff00112233445566778899aabbccddeeff00",
    )
    .unwrap();
    let snapshots = run_builder(
        TraceBuilder::new()
            .push32(wide)
            .push1(1)
            .push1(2)
            .dup(3) // duplicate the wide value to the top
            .swap(2) // swap it with the 1
            .stop(),
    );
    let last = snapshots.last().unwrap();
    assert_eq!(
        last,
        &vec![Word256::from_u64(1), Word256::from_u64(2), wide, wide]
    );
}

#[test]
fn test_deep_dup_and_swap() {
    let mut builder = TraceBuilder::new();
    for i in 1..=16 {
        builder = builder.push1(i);
    }
    // stack is [16, 15, ..., 1]; DUP16 brings the deepest (1) up, SWAP15
    // then exchanges the copy with the 2 sitting fifteen slots down.
    let snapshots = run_builder(builder.dup(16).swap(15).stop());
    let last = snapshots.last().unwrap();
    assert_eq!(last.len(), 17);
    assert_eq!(last[0], Word256::from_u64(2));
    assert_eq!(last[15], Word256::from_u64(1));
    assert_eq!(last[16], Word256::from_u64(1));
}

#[test]
fn test_jumpi_taken() {
    // PUSH1 0; PUSH1 10; JUMPI (not taken); PUSH1 1; PUSH1 12; JUMPI
    // (taken); JUMPDEST; PUSH1 1 -- the INVALID branch is never executed,
    // so it never appears in the trace.
    let snapshots = run_builder(
        TraceBuilder::new()
            .push1(0)
            .push1(10)
            .jumpi()
            .push1(1)
            .push1(12)
            .jumpi()
            .jumpdest()
            .push1(1)
            .stop(),
    );
    assert_eq!(snapshots.last().unwrap(), &vec![Word256::from_u64(1)]);
}

#[test]
fn test_pop_discards_top() {
    let snapshots = run_builder(TraceBuilder::new().push1(1).push1(2).pop().stop());
    assert_eq!(snapshots.last().unwrap(), &vec![Word256::from_u64(1)]);
}

#[test]
fn test_sstore_then_sload() {
    let snapshots = run_builder(
        TraceBuilder::new()
            .push1(0x42)
            .push0()
            .sstore()
            .push0()
            .sload()
            .stop(),
    );
    assert_eq!(snapshots.last().unwrap(), &vec![Word256::from_u64(0x42)]);
}

#[test]
fn test_transient_storage_roundtrip() {
    let snapshots = run_builder(
        TraceBuilder::new()
            .push1(0x99)
            .push1(0x05)
            .tstore()
            .push1(0x05)
            .tload()
            .stop(),
    );
    assert_eq!(snapshots.last().unwrap(), &vec![Word256::from_u64(0x99)]);
}

#[test]
fn test_sload_of_unwritten_slot_is_zero() {
    let snapshots = run_builder(TraceBuilder::new().push1(9).sload().stop());
    assert_eq!(snapshots.last().unwrap(), &vec![Word256::ZERO]);
}

#[test]
fn test_oracle_keccak_roundtrip() {
    // The value pushed for an oracle opcode must equal the next step's top
    // of stack, by construction; the differential run confirms the emitted
    // load reproduces it.
    let digest =
        Word256::from_hex("0x290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563")
            .unwrap();
    let snapshots = run_builder(
        TraceBuilder::new()
            .push1(32)
            .push0()
            .oracle(EvmOpcode::Keccak256, digest)
            .stop(),
    );
    assert_eq!(snapshots.last().unwrap(), &vec![digest]);
}

#[test]
fn test_oracle_msize_and_pc() {
    let snapshots = run_builder(
        TraceBuilder::new()
            .oracle(EvmOpcode::MSize, Word256::from_u64(96))
            .oracle(EvmOpcode::Pc, Word256::from_u64(7))
            .stop(),
    );
    assert_eq!(
        snapshots.last().unwrap(),
        &vec![Word256::from_u64(7), Word256::from_u64(96)]
    );
}

#[test]
fn test_context_accessors() {
    let mut builder = TraceBuilder::new();
    {
        let state = builder.state_mut();
        state.call_value = Word256::from_u64(1000);
        state.caller = Word256::from_hex("0xabcd").unwrap();
        state.timestamp = Word256::from_u64(1_700_000_000);
        state.chain_id = Word256::from_u64(1337);
        state.block_number = Word256::from_u64(23_041_867);
        state.gas = Word256::from_u64(100_000);
        state.call_data = vec![0xAA; 68];
        state.code = vec![0x60, 0x42, 0x00];
    }
    let snapshots = run_builder(
        builder
            .callvalue()
            .caller()
            .timestamp()
            .chainid()
            .number()
            .gas()
            .calldatasize()
            .codesize()
            .stop(),
    );
    let last = snapshots.last().unwrap();
    assert_eq!(last[0], Word256::from_u64(3)); // CODESIZE
    assert_eq!(last[1], Word256::from_u64(68)); // CALLDATASIZE
    assert_eq!(last[2], Word256::from_u64(100_000)); // GAS
    assert_eq!(last[7], Word256::from_u64(1000)); // CALLVALUE
}

#[test]
fn test_calldataload_with_offset_and_padding() {
    let mut builder = TraceBuilder::new();
    builder.state_mut().call_data = (0u8..40).collect();
    let snapshots = run_builder(
        builder
            .push1(4)
            .calldataload() // bytes 4..36
            .push1(32)
            .calldataload() // bytes 32..40 zero-padded
            .stop(),
    );
    let last = snapshots.last().unwrap();
    let mut first = [0u8; 32];
    for (i, b) in first.iter_mut().enumerate() {
        *b = (i + 4) as u8;
    }
    let mut second = [0u8; 32];
    for (i, b) in second.iter_mut().enumerate().take(8) {
        *b = (i + 32) as u8;
    }
    assert_eq!(last[1], Word256::from_be_bytes(first));
    assert_eq!(last[0], Word256::from_be_bytes(second));
}

#[test]
fn test_mstore_mload_oracle_pair() {
    // MSTORE is elided; the later MLOAD is satisfied by the oracle.
    let snapshots = run_builder(
        TraceBuilder::new()
            .push1(0x2A)
            .push0()
            .oracle(EvmOpcode::MStore, Word256::ZERO)
            .push0()
            .oracle(EvmOpcode::MLoad, Word256::from_u64(0x2A))
            .stop(),
    );
    assert_eq!(snapshots.last().unwrap(), &vec![Word256::from_u64(0x2A)]);
}

// ---------------------------------------------------------------------------
// Nested calls
// ---------------------------------------------------------------------------

fn call_preamble(builder: TraceBuilder, marker: u8, callee: [u8; 20]) -> TraceBuilder {
    builder
        .push1(marker)
        .push1(0x20)
        .push1(0)
        .push1(0)
        .push1(0)
        .push1(0)
        .push20(&callee)
        .push2(0x2710)
}

#[test]
fn test_nested_call_success() {
    let builder = call_preamble(TraceBuilder::new(), 0xAA, [0x22; 20])
        .call()
        .push0()
        .push0()
        .ret()
        .stack_restore(true)
        .push1(0xDD)
        .stop();
    let snapshots = run_builder(builder);
    let last = snapshots.last().unwrap();
    assert_eq!(
        last,
        &vec![
            Word256::from_u64(0xDD),
            Word256::from_u64(1),
            Word256::from_u64(0xAA)
        ],
        "success flag must sit where the CALL return convention puts it"
    );
}

#[test]
fn test_nested_call_revert() {
    let builder = call_preamble(TraceBuilder::new(), 0xAA, [0x22; 20])
        .call()
        .push1(0xBB)
        .push0()
        .push0()
        .revert()
        .stack_restore(false)
        .push1(0xDD)
        .stop();
    let snapshots = run_builder(builder);
    assert_eq!(
        snapshots.last().unwrap(),
        &vec![
            Word256::from_u64(0xDD),
            Word256::from_u64(0),
            Word256::from_u64(0xAA)
        ]
    );
}

#[test]
fn test_nested_call_invalid() {
    let builder = call_preamble(TraceBuilder::new(), 0xAA, [0x22; 20])
        .call()
        .push1(0xBB)
        .invalid()
        .stack_restore(false)
        .push1(0xDD)
        .stop();
    let snapshots = run_builder(builder);
    assert_eq!(
        snapshots.last().unwrap(),
        &vec![
            Word256::from_u64(0xDD),
            Word256::from_u64(0),
            Word256::from_u64(0xAA)
        ]
    );
}

#[test]
fn test_delegatecall_and_staticcall() {
    for op in [EvmOpcode::DelegateCall, EvmOpcode::StaticCall] {
        let builder = TraceBuilder::new()
            .push1(0xAA)
            .push1(0x20)
            .push1(0)
            .push1(0)
            .push1(0)
            .push20(&[0x22; 20])
            .push2(0x2710)
            .call_op(op)
            .push1(0xBB)
            .push0()
            .push0()
            .ret()
            .stack_restore(true)
            .push1(0xDD)
            .stop();
        let snapshots = run_builder(builder);
        assert_eq!(
            snapshots.last().unwrap(),
            &vec![
                Word256::from_u64(0xDD),
                Word256::from_u64(1),
                Word256::from_u64(0xAA)
            ]
        );
    }
}

#[test]
fn test_nested_call_depth_three() {
    // A calls B, B calls C, C returns, B returns.
    let builder = call_preamble(TraceBuilder::new(), 0xAA, [0x22; 20]).call();
    let builder = call_preamble(builder, 0xBB, [0x33; 20])
        .call()
        .push1(0xCC)
        .push0()
        .push0()
        .ret()
        .stack_restore(true)
        .push0()
        .push0()
        .ret()
        .stack_restore(true)
        .stop();
    let snapshots = run_builder(builder);
    assert_eq!(
        snapshots.last().unwrap(),
        &vec![Word256::from_u64(1), Word256::from_u64(0xAA)]
    );
}

#[test]
fn test_inner_stack_leftovers_do_not_leak() {
    // The callee leaves values on its frame before returning; the caller's
    // view after restore must contain only its own slots plus the flag.
    let builder = call_preamble(TraceBuilder::new(), 0xAA, [0x22; 20])
        .call()
        .push1(0x11)
        .push1(0x22)
        .push1(0x33)
        .push0()
        .push0()
        .ret()
        .stack_restore(true)
        .stop();
    let snapshots = run_builder(builder);
    assert_eq!(
        snapshots.last().unwrap(),
        &vec![Word256::from_u64(1), Word256::from_u64(0xAA)]
    );
}

// ---------------------------------------------------------------------------
// Transaction boundaries
// ---------------------------------------------------------------------------

#[test]
fn test_transaction_boundary_between_traces() {
    let (tx1, state1) = TraceBuilder::new()
        .push1(0x42)
        .push0()
        .sstore()
        .stop()
        .build();
    let (tx2, state2) = TraceBuilder::new().push0().sload().stop().build();

    let mut transpiler = Transpiler::new(TranspilerConfig::default());
    let mut expected = transpiler.process_execution(&tx1, &state1).unwrap();
    transpiler.add_transaction_boundary();
    // The second transaction starts from fresh storage: its SLOAD sees
    // zero, exactly what the builder (fresh storage map) recorded.
    expected.extend(transpiler.process_execution(&tx2, &state2).unwrap());

    let assembly = transpiler.to_assembly();
    let report = VmRunner::new()
        .execute(&assembly.to_debug_assembly())
        .unwrap();
    assert_eq!(report.stack_snapshots, expected);
    assert_eq!(
        report.stack_snapshots.last().unwrap(),
        &vec![Word256::ZERO]
    );
}

#[test]
fn test_boundary_matches_concatenated_bodies() {
    // Emitting a boundary between two traces equals transpiling the two
    // bodies independently and splicing the boundary prologue in between.
    let trace_a = || TraceBuilder::new().push1(1).push1(2).add().stop().build();
    let trace_b = || TraceBuilder::new().push1(7).pop().stop().build();

    let combined = {
        let mut t = Transpiler::new(TranspilerConfig::default());
        let (steps, state) = trace_a();
        t.process_execution(&steps, &state).unwrap();
        t.add_transaction_boundary();
        let (steps, state) = trace_b();
        t.process_execution(&steps, &state).unwrap();
        t.to_assembly()
    };

    let spliced = {
        let mut first = {
            let mut t = Transpiler::new(TranspilerConfig::default());
            let (steps, state) = trace_a();
            t.process_execution(&steps, &state).unwrap();
            t.to_assembly()
        };
        let second = {
            let mut t = Transpiler::new(TranspilerConfig::default());
            let (steps, state) = trace_b();
            t.process_execution(&steps, &state).unwrap();
            t.to_assembly()
        };
        let mut t = Transpiler::new(TranspilerConfig::default());
        t.add_transaction_boundary();
        let boundary = t.to_assembly();
        first.instructions.extend(boundary.instructions);
        first.instructions.extend(second.instructions);
        // trace_b interns no constants, so the data sections line up.
        first.data_section.extend(second.data_section);
        first
    };

    assert_eq!(combined, spliced);
}

// ---------------------------------------------------------------------------
// Determinism and dedup at the assembly level
// ---------------------------------------------------------------------------

#[test]
fn test_transpile_twice_is_byte_identical() {
    let build = || {
        let (steps, state) = TraceBuilder::new()
            .push32(Word256::from_u64(0xDEADBEEF))
            .push1(0x10)
            .add()
            .push0()
            .sstore()
            .stop()
            .build();
        let mut t = Transpiler::new(TranspilerConfig::default());
        t.process_execution(&steps, &state).unwrap();
        t.to_assembly().to_toolchain_assembly()
    };
    assert_eq!(build(), build());
}

#[test]
fn test_same_constant_same_symbol() {
    let wide = Word256::from_hex("0x112233445566778899aa").unwrap();
    let (steps, state) = TraceBuilder::new()
        .push32(wide)
        .pop()
        .push32(wide)
        .stop()
        .build();
    let mut t = Transpiler::new(TranspilerConfig::default());
    t.process_execution(&steps, &state).unwrap();
    let assembly = t.to_assembly();
    assert_eq!(assembly.data_section.len(), 1);
    let loads: Vec<_> = assembly
        .instructions
        .iter()
        .filter(|i| i.mnemonic == "la")
        .collect();
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[0].operands, loads[1].operands);
}

#[test]
fn test_call_depth_balanced_over_trace_prefixes() {
    let (steps, state) = call_preamble(TraceBuilder::new(), 0xAA, [0x22; 20])
        .call()
        .push0()
        .push0()
        .ret()
        .stack_restore(true)
        .stop()
        .build();
    let mut t = Transpiler::new(TranspilerConfig::default());
    for (i, step) in steps.iter().enumerate() {
        let hint = steps.get(i + 1).map(|s| s.stack_before.as_slice());
        t.add_instruction(step, &state, hint).unwrap();
        // Depth is never driven negative by any prefix of the trace.
        assert!(t.call_depth() <= 1);
    }
    assert_eq!(t.call_depth(), 0);
}
