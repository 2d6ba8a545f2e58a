//! Deterministic construction of EVM step traces.
//!
//! `TraceBuilder` plays the tracer's role without an EVM underneath: each
//! call records a step with the current stack as its `stack_before`, then
//! applies the opcode's real semantics to a reference 256-bit model. The
//! differential tests drive the transpiler with these traces and compare
//! emulator samples against the recorded snapshots.
//!
//! The builder models *actual* EVM semantics (e.g. last-write-wins storage);
//! the transpiler's documented modeling shortcuts are covered separately by
//! unit tests so the divergence stays visible.

use crate::opcode::EvmOpcode;
use crate::step::{EvmStep, ExecutionState};
use std::collections::HashMap;
use zevm_primitives::Word256;

/// Reference 256-bit arithmetic on four little-endian u64 limbs. Only the
/// trace builder uses this; emitted programs do their arithmetic in the
/// linked helper library.
mod ref256 {
    use zevm_primitives::Word256;

    pub fn to_limbs(w: Word256) -> [u64; 4] {
        let bytes = w.to_be_bytes();
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let chunk: [u8; 8] = bytes[24 - i * 8..32 - i * 8].try_into().unwrap();
            *limb = u64::from_be_bytes(chunk);
        }
        limbs
    }

    pub fn from_limbs(limbs: [u64; 4]) -> Word256 {
        let mut bytes = [0u8; 32];
        for (i, limb) in limbs.iter().enumerate() {
            bytes[24 - i * 8..32 - i * 8].copy_from_slice(&limb.to_be_bytes());
        }
        Word256::from_be_bytes(bytes)
    }

    pub fn add(a: Word256, b: Word256) -> Word256 {
        let (a, b) = (to_limbs(a), to_limbs(b));
        let mut out = [0u64; 4];
        let mut carry = 0u128;
        for i in 0..4 {
            let sum = a[i] as u128 + b[i] as u128 + carry;
            out[i] = sum as u64;
            carry = sum >> 64;
        }
        from_limbs(out)
    }

    pub fn sub(a: Word256, b: Word256) -> Word256 {
        let (a, b) = (to_limbs(a), to_limbs(b));
        let mut out = [0u64; 4];
        let mut borrow = 0u64;
        for i in 0..4 {
            let (d1, b1) = a[i].overflowing_sub(b[i]);
            let (d2, b2) = d1.overflowing_sub(borrow);
            out[i] = d2;
            borrow = (b1 | b2) as u64;
        }
        from_limbs(out)
    }

    pub fn mul(a: Word256, b: Word256) -> Word256 {
        let (a, b) = (to_limbs(a), to_limbs(b));
        let mut out = [0u64; 4];
        for i in 0..4 {
            let mut carry = 0u128;
            for j in 0..4 - i {
                let acc = out[i + j] as u128 + (a[i] as u128) * (b[j] as u128) + carry;
                out[i + j] = acc as u64;
                carry = acc >> 64;
            }
        }
        from_limbs(out)
    }

    pub fn div(a: Word256, b: Word256) -> Word256 {
        if b.is_zero() {
            return Word256::ZERO;
        }
        // Bit-serial long division, mirroring the emitted helper.
        let mut rem = Word256::ZERO;
        let mut quot = Word256::ZERO;
        for bit in (0..256).rev() {
            rem = shl(rem, 1);
            if get_bit(a, bit) {
                rem = or_low_bit(rem);
            }
            if !lt(rem, b) {
                rem = sub(rem, b);
                quot = set_bit(quot, bit);
            }
        }
        quot
    }

    fn get_bit(w: Word256, bit: usize) -> bool {
        let limbs = to_limbs(w);
        (limbs[bit / 64] >> (bit % 64)) & 1 == 1
    }

    fn set_bit(w: Word256, bit: usize) -> Word256 {
        let mut limbs = to_limbs(w);
        limbs[bit / 64] |= 1 << (bit % 64);
        from_limbs(limbs)
    }

    fn or_low_bit(w: Word256) -> Word256 {
        let mut limbs = to_limbs(w);
        limbs[0] |= 1;
        from_limbs(limbs)
    }

    pub fn bitwise(a: Word256, b: Word256, f: impl Fn(u64, u64) -> u64) -> Word256 {
        let (a, b) = (to_limbs(a), to_limbs(b));
        let mut out = [0u64; 4];
        for i in 0..4 {
            out[i] = f(a[i], b[i]);
        }
        from_limbs(out)
    }

    pub fn not(a: Word256) -> Word256 {
        let mut limbs = to_limbs(a);
        for limb in &mut limbs {
            *limb = !*limb;
        }
        from_limbs(limbs)
    }

    pub fn lt(a: Word256, b: Word256) -> bool {
        a.to_be_bytes() < b.to_be_bytes()
    }

    pub fn slt(a: Word256, b: Word256) -> bool {
        let a_neg = a.to_be_bytes()[0] & 0x80 != 0;
        let b_neg = b.to_be_bytes()[0] & 0x80 != 0;
        match (a_neg, b_neg) {
            (true, false) => true,
            (false, true) => false,
            _ => lt(a, b),
        }
    }

    pub fn shl(value: Word256, shift: usize) -> Word256 {
        if shift >= 256 {
            return Word256::ZERO;
        }
        let limbs = to_limbs(value);
        let (words, bits) = (shift / 64, shift % 64);
        let mut out = [0u64; 4];
        for k in (0..4).rev() {
            let lo = if k >= words { limbs[k - words] } else { 0 };
            let hi = if bits > 0 && k > words {
                limbs[k - words - 1] >> (64 - bits)
            } else {
                0
            };
            out[k] = (lo << bits) | hi;
        }
        from_limbs(out)
    }

    pub fn shr(value: Word256, shift: usize) -> Word256 {
        if shift >= 256 {
            return Word256::ZERO;
        }
        let limbs = to_limbs(value);
        let (words, bits) = (shift / 64, shift % 64);
        let mut out = [0u64; 4];
        for k in 0..4 {
            let lo = if k + words < 4 { limbs[k + words] } else { 0 };
            let hi = if bits > 0 && k + words + 1 < 4 {
                limbs[k + words + 1] << (64 - bits)
            } else {
                0
            };
            out[k] = (lo >> bits) | hi;
        }
        from_limbs(out)
    }
}

/// Builds `(Vec<EvmStep>, ExecutionState)` pairs step by step.
pub struct TraceBuilder {
    steps: Vec<EvmStep>,
    stack: Vec<Word256>,
    suspended: Vec<Vec<Word256>>,
    depth: u32,
    storage: HashMap<String, Word256>,
    transient: HashMap<String, Word256>,
    state: ExecutionState,
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::with_state(ExecutionState::default())
    }

    pub fn with_state(state: ExecutionState) -> Self {
        Self {
            steps: Vec::new(),
            stack: Vec::new(),
            suspended: Vec::new(),
            depth: 0,
            storage: HashMap::new(),
            transient: HashMap::new(),
            state,
        }
    }

    /// The execution state the trace will be paired with.
    pub fn state_mut(&mut self) -> &mut ExecutionState {
        &mut self.state
    }

    /// Finish, returning the trace and its execution state.
    pub fn build(self) -> (Vec<EvmStep>, ExecutionState) {
        (self.steps, self.state)
    }

    fn record(&mut self, opcode: EvmOpcode, immediate: Vec<u8>) {
        self.steps.push(EvmStep {
            opcode,
            immediate_args: immediate,
            stack_before: self.stack.clone(),
            call_depth: self.depth,
            is_stack_restore: false,
            result: None,
        });
    }

    fn pop_value(&mut self) -> Word256 {
        self.stack.remove(0)
    }

    fn push_value(&mut self, value: Word256) {
        self.stack.insert(0, value);
    }

    // -- pushes ------------------------------------------------------------

    /// `PUSHn` for the given immediate bytes (`PUSH0` for an empty slice).
    pub fn push_imm(mut self, bytes: &[u8]) -> Self {
        assert!(bytes.len() <= 32, "push immediate too long");
        self.record(EvmOpcode::Push(bytes.len() as u8), bytes.to_vec());
        let value = Word256::from_be_slice(bytes);
        self.push_value(value);
        self
    }

    pub fn push0(self) -> Self {
        self.push_imm(&[])
    }

    pub fn push1(self, value: u8) -> Self {
        self.push_imm(&[value])
    }

    pub fn push2(self, value: u16) -> Self {
        self.push_imm(&value.to_be_bytes())
    }

    pub fn push4(self, value: u32) -> Self {
        self.push_imm(&value.to_be_bytes())
    }

    pub fn push20(self, address: &[u8; 20]) -> Self {
        self.push_imm(address)
    }

    pub fn push32(self, value: Word256) -> Self {
        self.push_imm(&value.to_be_bytes())
    }

    // -- arithmetic / comparison (reference semantics) ----------------------

    fn binary(mut self, op: EvmOpcode, f: impl Fn(Word256, Word256) -> Word256) -> Self {
        self.record(op, Vec::new());
        let a = self.pop_value();
        let b = self.pop_value();
        self.push_value(f(a, b));
        self
    }

    pub fn add(self) -> Self {
        self.binary(EvmOpcode::Add, ref256::add)
    }

    pub fn sub(self) -> Self {
        self.binary(EvmOpcode::Sub, ref256::sub)
    }

    pub fn mul(self) -> Self {
        self.binary(EvmOpcode::Mul, ref256::mul)
    }

    pub fn div(self) -> Self {
        self.binary(EvmOpcode::Div, ref256::div)
    }

    pub fn and(self) -> Self {
        self.binary(EvmOpcode::And, |a, b| ref256::bitwise(a, b, |x, y| x & y))
    }

    pub fn or(self) -> Self {
        self.binary(EvmOpcode::Or, |a, b| ref256::bitwise(a, b, |x, y| x | y))
    }

    pub fn xor(self) -> Self {
        self.binary(EvmOpcode::Xor, |a, b| ref256::bitwise(a, b, |x, y| x ^ y))
    }

    pub fn eq(self) -> Self {
        self.binary(EvmOpcode::Eq, |a, b| Word256::from_u64((a == b) as u64))
    }

    pub fn lt(self) -> Self {
        self.binary(EvmOpcode::Lt, |a, b| {
            Word256::from_u64(ref256::lt(a, b) as u64)
        })
    }

    pub fn gt(self) -> Self {
        self.binary(EvmOpcode::Gt, |a, b| {
            Word256::from_u64(ref256::lt(b, a) as u64)
        })
    }

    pub fn slt(self) -> Self {
        self.binary(EvmOpcode::Slt, |a, b| {
            Word256::from_u64(ref256::slt(a, b) as u64)
        })
    }

    pub fn shr(self) -> Self {
        self.binary(EvmOpcode::Shr, |shift, value| {
            match shift.to_usize() {
                Some(s) => ref256::shr(value, s.min(256)),
                None => Word256::ZERO,
            }
        })
    }

    pub fn shl(self) -> Self {
        self.binary(EvmOpcode::Shl, |shift, value| {
            match shift.to_usize() {
                Some(s) => ref256::shl(value, s.min(256)),
                None => Word256::ZERO,
            }
        })
    }

    pub fn not(mut self) -> Self {
        self.record(EvmOpcode::Not, Vec::new());
        let a = self.pop_value();
        self.push_value(ref256::not(a));
        self
    }

    pub fn iszero(mut self) -> Self {
        self.record(EvmOpcode::IsZero, Vec::new());
        let a = self.pop_value();
        self.push_value(Word256::from_u64(a.is_zero() as u64));
        self
    }

    // -- stack shuffling ----------------------------------------------------

    pub fn pop(mut self) -> Self {
        self.record(EvmOpcode::Pop, Vec::new());
        self.pop_value();
        self
    }

    pub fn dup(mut self, n: usize) -> Self {
        self.record(EvmOpcode::Dup(n as u8), Vec::new());
        let value = self.stack[n - 1];
        self.push_value(value);
        self
    }

    pub fn swap(mut self, n: usize) -> Self {
        self.record(EvmOpcode::Swap(n as u8), Vec::new());
        self.stack.swap(0, n);
        self
    }

    // -- control flow -------------------------------------------------------

    pub fn jump(mut self) -> Self {
        self.record(EvmOpcode::Jump, Vec::new());
        self.pop_value();
        self
    }

    pub fn jumpi(mut self) -> Self {
        self.record(EvmOpcode::JumpI, Vec::new());
        self.pop_value();
        self.pop_value();
        self
    }

    pub fn jumpdest(mut self) -> Self {
        self.record(EvmOpcode::JumpDest, Vec::new());
        self
    }

    // -- context accessors --------------------------------------------------

    fn context(mut self, op: EvmOpcode, value: Word256) -> Self {
        self.record(op, Vec::new());
        self.push_value(value);
        self
    }

    pub fn callvalue(self) -> Self {
        let v = self.state.call_value;
        self.context(EvmOpcode::CallValue, v)
    }

    pub fn caller(self) -> Self {
        let v = self.state.caller;
        self.context(EvmOpcode::Caller, v)
    }

    pub fn address(self) -> Self {
        let v = self.state.address;
        self.context(EvmOpcode::Address, v)
    }

    pub fn origin(self) -> Self {
        let v = self.state.origin;
        self.context(EvmOpcode::Origin, v)
    }

    pub fn timestamp(self) -> Self {
        let v = self.state.timestamp;
        self.context(EvmOpcode::Timestamp, v)
    }

    pub fn chainid(self) -> Self {
        let v = self.state.chain_id;
        self.context(EvmOpcode::ChainId, v)
    }

    pub fn number(self) -> Self {
        let v = self.state.block_number;
        self.context(EvmOpcode::Number, v)
    }

    pub fn gas(self) -> Self {
        let v = self.state.gas;
        self.context(EvmOpcode::Gas, v)
    }

    pub fn calldatasize(self) -> Self {
        let v = Word256::from_u64(self.state.call_data.len() as u64);
        self.context(EvmOpcode::CallDataSize, v)
    }

    pub fn codesize(self) -> Self {
        let v = Word256::from_u64(self.state.code.len() as u64);
        self.context(EvmOpcode::CodeSize, v)
    }

    pub fn calldataload(mut self) -> Self {
        self.record(EvmOpcode::CallDataLoad, Vec::new());
        let offset = self.pop_value();
        let mut buf = [0u8; 32];
        if let Some(off) = offset.to_usize() {
            if off < self.state.call_data.len() {
                let end = (off + 32).min(self.state.call_data.len());
                buf[..end - off].copy_from_slice(&self.state.call_data[off..end]);
            }
        }
        self.push_value(Word256::from_be_bytes(buf));
        self
    }

    // -- oracle opcodes -----------------------------------------------------

    /// Record an oracle-sourced opcode with its known post-step value.
    pub fn oracle(mut self, op: EvmOpcode, result: Word256) -> Self {
        self.record(op, Vec::new());
        for _ in 0..op.pops() {
            self.pop_value();
        }
        if op.pushes() == 1 {
            self.push_value(result);
        }
        self
    }

    // -- storage ------------------------------------------------------------

    pub fn sstore(mut self) -> Self {
        self.record(EvmOpcode::SStore, Vec::new());
        let key = self.pop_value();
        let value = self.pop_value();
        self.storage.insert(key.to_hex(), value);
        self
    }

    pub fn sload(mut self) -> Self {
        self.record(EvmOpcode::SLoad, Vec::new());
        let key = self.pop_value();
        let value = self
            .storage
            .get(&key.to_hex())
            .copied()
            .unwrap_or(Word256::ZERO);
        self.push_value(value);
        self
    }

    pub fn tstore(mut self) -> Self {
        self.record(EvmOpcode::TStore, Vec::new());
        let key = self.pop_value();
        let value = self.pop_value();
        self.transient.insert(key.to_hex(), value);
        self
    }

    pub fn tload(mut self) -> Self {
        self.record(EvmOpcode::TLoad, Vec::new());
        let key = self.pop_value();
        let value = self
            .transient
            .get(&key.to_hex())
            .copied()
            .unwrap_or(Word256::ZERO);
        self.push_value(value);
        self
    }

    // -- nested calls -------------------------------------------------------

    /// Record a call opcode (its 6 or 7 operands must already be on the
    /// stack) and enter the callee's empty frame.
    pub fn call_op(mut self, op: EvmOpcode) -> Self {
        assert!(op.is_call(), "call_op takes a call opcode");
        self.record(op, Vec::new());
        for _ in 0..op.pops() {
            self.pop_value();
        }
        let parent = std::mem::take(&mut self.stack);
        self.suspended.push(parent);
        self.depth += 1;
        self
    }

    pub fn call(self) -> Self {
        self.call_op(EvmOpcode::Call)
    }

    /// `RETURN` inside a nested frame: consumes offset/size and tears the
    /// frame down.
    pub fn ret(mut self) -> Self {
        self.record(EvmOpcode::Return, Vec::new());
        self.pop_value();
        self.pop_value();
        self.stack.clear();
        self
    }

    pub fn revert(mut self) -> Self {
        self.record(EvmOpcode::Revert, Vec::new());
        self.pop_value();
        self.pop_value();
        self.stack.clear();
        self
    }

    pub fn invalid(mut self) -> Self {
        self.record(EvmOpcode::Invalid, Vec::new());
        self.stack.clear();
        self
    }

    /// The tracer's synthetic marker after a nested call returns: resume the
    /// caller's frame and push the success flag.
    pub fn stack_restore(mut self, success: bool) -> Self {
        self.steps.push(EvmStep {
            opcode: EvmOpcode::Stop,
            immediate_args: Vec::new(),
            stack_before: self.stack.clone(),
            call_depth: self.depth,
            is_stack_restore: true,
            result: Some(Word256::from_u64(success as u64)),
        });
        self.stack = self.suspended.pop().expect("stack restore without call");
        self.push_value(Word256::from_u64(success as u64));
        self.depth -= 1;
        self
    }

    pub fn stop(mut self) -> Self {
        self.record(EvmOpcode::Stop, Vec::new());
        self
    }
}
