//! In-process trace runner: deploys contracts into a cache database,
//! executes a call under the step inspector and assembles the execution
//! state snapshot the transpiler reads context opcodes from.

use crate::inspector::StepInspector;
use crate::{Result, TracerError};
use revm::{
    context::TxEnv,
    database::CacheDB,
    database_interface::EmptyDB,
    primitives::{Address, Bytes, TxKind, U256},
    state::{AccountInfo, Bytecode},
    Context, InspectEvm, MainBuilder, MainContext,
};
use tracing::debug;
use zevm_primitives::Word256;
use zevm_transpiler::{EvmStep, ExecutionState};

fn address_word(address: Address) -> Word256 {
    Word256::from_be_slice(address.as_slice())
}

fn u256_word(value: U256) -> Word256 {
    Word256::from_be_bytes(value.to_be_bytes::<32>())
}

/// Tracer configuration: the transaction sender and the context snapshot
/// values recorded into [`ExecutionState`].
#[derive(Debug, Clone)]
pub struct TracerConfig {
    pub caller: Address,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub timestamp: u64,
    pub block_number: u64,
    pub coinbase: Address,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            caller: Address::with_last_byte(0xAB),
            gas_limit: 1_000_000,
            chain_id: 1,
            timestamp: 1,
            block_number: 1,
            coinbase: Address::ZERO,
        }
    }
}

/// Address raw bytecode is installed at by [`trace_bytecode`].
pub const DEFAULT_CONTRACT_ADDRESS: Address = Address::new([
    0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78, 0x90,
    0x12, 0x34, 0x56, 0x78, 0x90,
]);

/// Trace a standalone bytecode blob: deploy it at
/// [`DEFAULT_CONTRACT_ADDRESS`] and execute one call against it.
pub fn trace_bytecode(
    code: Vec<u8>,
    input: Vec<u8>,
) -> Result<(Vec<EvmStep>, ExecutionState)> {
    let mut runner = TraceRunner::default();
    runner.deploy_contract(DEFAULT_CONTRACT_ADDRESS, code, U256::from(1000));
    runner.execute(DEFAULT_CONTRACT_ADDRESS, input, U256::ZERO)
}

/// Deploys contracts and traces calls against them.
pub struct TraceRunner {
    db: CacheDB<EmptyDB>,
    config: TracerConfig,
    /// Deployed code sizes, recorded into the execution state for
    /// `EXTCODESIZE`.
    code_sizes: Vec<(Address, u64)>,
    /// Code of the most recently deployed target, keyed by address.
    codes: Vec<(Address, Vec<u8>)>,
}

impl Default for TraceRunner {
    fn default() -> Self {
        Self::new(TracerConfig::default())
    }
}

impl TraceRunner {
    pub fn new(config: TracerConfig) -> Self {
        let mut db = CacheDB::new(EmptyDB::default());
        // Fund the sender generously; gas accounting is out of scope.
        let balance = U256::from(10u128.pow(24));
        db.insert_account_info(
            config.caller,
            AccountInfo {
                balance,
                ..AccountInfo::default()
            },
        );
        Self {
            db,
            config,
            code_sizes: Vec::new(),
            codes: Vec::new(),
        }
    }

    /// Install a contract at `address`.
    pub fn deploy_contract(&mut self, address: Address, code: Vec<u8>, balance: U256) {
        let bytecode = Bytecode::new_legacy(Bytes::from(code.clone()));
        let code_hash = bytecode.hash_slow();
        self.db.insert_account_info(
            address,
            AccountInfo {
                balance,
                nonce: 0,
                code_hash,
                code: Some(bytecode),
            },
        );
        self.code_sizes.push((address, code.len() as u64));
        self.codes.push((address, code));
    }

    /// Execute a call to `target` under the step inspector, returning the
    /// captured trace and the execution-state snapshot.
    pub fn execute(
        &mut self,
        target: Address,
        input: Vec<u8>,
        value: U256,
    ) -> Result<(Vec<EvmStep>, ExecutionState)> {
        let ctx = Context::mainnet().with_db(self.db.clone());
        let mut evm = ctx.build_mainnet_with_inspector(StepInspector::new());

        let tx = TxEnv::builder()
            .caller(self.config.caller)
            .kind(TxKind::Call(target))
            .data(Bytes::from(input.clone()))
            .value(value)
            .gas_limit(self.config.gas_limit)
            .build()
            .map_err(|err| TracerError::TxBuild(format!("{err:?}")))?;

        evm.inspect_one_tx(tx)
            .map_err(|err| TracerError::Execution(err.to_string()))?;

        let inspector = std::mem::take(&mut evm.inspector);
        let steps = inspector.finish()?;
        debug!(steps = steps.len(), target = %target, "captured trace");

        let state = self.execution_state(target, input, value);
        Ok((steps, state))
    }

    fn execution_state(&self, target: Address, input: Vec<u8>, value: U256) -> ExecutionState {
        let code = self
            .codes
            .iter()
            .find(|(addr, _)| *addr == target)
            .map(|(_, code)| code.clone())
            .unwrap_or_default();

        let mut state = ExecutionState {
            call_value: u256_word(value),
            call_data: input,
            code,
            address: address_word(target),
            caller: address_word(self.config.caller),
            origin: address_word(self.config.caller),
            coinbase: address_word(self.config.coinbase),
            timestamp: Word256::from_u64(self.config.timestamp),
            chain_id: Word256::from_u64(self.config.chain_id),
            block_number: Word256::from_u64(self.config.block_number),
            // Snapshot value: the call's gas budget. Per-step remaining gas
            // is not modeled.
            gas: Word256::from_u64(self.config.gas_limit),
            ..ExecutionState::default()
        };
        for (address, size) in &self.code_sizes {
            state.set_code_size(address_word(*address), *size);
        }
        state
    }
}
