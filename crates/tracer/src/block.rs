//! Block-level trace fan-out.
//!
//! Tracing is the expensive, side-effect-free stage, so a block's
//! transactions are traced concurrently under a semaphore cap. The results
//! are then re-serialized in original transaction order into a single
//! transpiler — the data section and storage bindings are sequential state
//! and must see transactions in order.

use crate::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use zevm_transpiler::{
    AssemblyFile, EvmStep, ExecutionState, StackSnapshot, Transpiler, TranspilerConfig,
    TranspilerError,
};

/// Default cap on concurrently traced transactions.
pub const DEFAULT_TRACE_CONCURRENCY: usize = 5;

/// Run the given trace jobs with at most `max_concurrent` in flight.
/// Results come back in job order, each job's outcome kept separate so a
/// failed trace can be reported per transaction.
pub async fn trace_transactions_parallel<F>(
    jobs: Vec<F>,
    max_concurrent: usize,
) -> Vec<Result<(Vec<EvmStep>, ExecutionState)>>
where
    F: FnOnce() -> Result<(Vec<EvmStep>, ExecutionState)> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut handles = Vec::with_capacity(jobs.len());

    for (index, job) in jobs.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            let result = tokio::task::spawn_blocking(job)
                .await
                .unwrap_or_else(|err| Err(crate::TracerError::Join(err.to_string())));
            if let Ok((steps, _)) = &result {
                info!(tx = index, steps = steps.len(), "traced transaction");
            } else {
                warn!(tx = index, "transaction trace failed");
            }
            result
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(
            handle
                .await
                .unwrap_or_else(|err| Err(crate::TracerError::Join(err.to_string()))),
        );
    }
    results
}

/// Feed per-transaction traces, in order, into one transpiler with a
/// transaction boundary between consecutive transactions.
///
/// Returns the block's assembly and the concatenated per-sentinel expected
/// snapshots.
pub fn transpile_block(
    traces: &[(Vec<EvmStep>, ExecutionState)],
    config: TranspilerConfig,
) -> std::result::Result<(AssemblyFile, Vec<StackSnapshot>), TranspilerError> {
    let mut transpiler = Transpiler::new(config);
    let mut snapshots = Vec::new();
    for (i, (steps, state)) in traces.iter().enumerate() {
        snapshots.extend(transpiler.process_execution(steps, state)?);
        if i + 1 < traces.len() {
            transpiler.add_transaction_boundary();
        }
    }
    Ok((transpiler.to_assembly(), snapshots))
}
