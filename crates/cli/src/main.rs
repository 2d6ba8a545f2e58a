//! zevm CLI: transpile EVM traces, prove the emitted assembly, verify
//! proofs, and bisect prover failures down to the offending EVM step.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use zevm_prover::{ProverConfig, ZkProver};
use zevm_transpiler::{
    assembly_from_prefix, load_mappings, EvmStep, ExecutionState, Transpiler, TranspilerConfig,
};

/// zevm: EVM-trace to RISC-V transpiler and zkVM prover driver
#[derive(Parser)]
#[command(name = "zevm")]
#[command(version = "0.1.0")]
#[command(about = "Prove EVM execution traces via RISC-V transpilation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace EVM bytecode in-process and write the step trace
    Trace {
        /// Hex-encoded contract bytecode (with or without 0x)
        #[arg(long, value_name = "HEX")]
        code: String,

        /// Hex-encoded calldata
        #[arg(long, value_name = "HEX", default_value = "")]
        calldata: String,

        /// Trace output path
        #[arg(long, value_name = "PATH", default_value = "trace.json")]
        output: PathBuf,
    },

    /// Transpile a trace file into RISC-V assembly
    Transpile {
        /// Trace JSON (steps plus execution state)
        #[arg(long, value_name = "PATH")]
        trace: PathBuf,

        /// Assembly output path
        #[arg(long, value_name = "PATH", default_value = "transpiled.s")]
        output: PathBuf,

        /// Also write per-step debug mappings
        #[arg(long, value_name = "PATH")]
        debug_mappings: Option<PathBuf>,

        /// Keep per-step ebreak sentinels in the output
        #[arg(long)]
        with_sentinels: bool,
    },

    /// Prove an assembly file with the external zkVM toolchain
    Prove {
        /// Assembly file to prove
        #[arg(long, value_name = "PATH")]
        assembly: PathBuf,

        /// Results output (hex-encoded proof and verification key)
        #[arg(long, value_name = "PATH", default_value = "results.json")]
        output: PathBuf,

        /// Abort the run after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Verify a proof against its verification key
    Verify {
        #[arg(long, value_name = "PATH")]
        app_vk: PathBuf,

        #[arg(long, value_name = "PATH")]
        proof: PathBuf,
    },

    /// Binary-search debug mappings for the EVM step that breaks proving
    Bisect {
        /// Debug-mapping JSON produced by `transpile --debug-mappings`
        #[arg(long, value_name = "PATH")]
        mappings: PathBuf,

        /// Per-probe proving timeout in seconds
        #[arg(long, value_name = "SECS", default_value = "600")]
        timeout: u64,
    },
}

/// On-disk trace format consumed by `transpile`.
#[derive(Serialize, Deserialize)]
struct TraceFile {
    steps: Vec<EvmStep>,
    state: ExecutionState,
}

/// On-disk results format written by `prove`.
#[derive(Serialize, Deserialize)]
struct ResultsFile {
    app_vk: String,
    proof: String,
    build_time_ms: u128,
    keygen_time_ms: u128,
    prove_time_ms: u128,
    total_time_ms: u128,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Commands::Trace {
            code,
            calldata,
            output,
        } => trace(code, calldata, output),
        Commands::Transpile {
            trace,
            output,
            debug_mappings,
            with_sentinels,
        } => transpile(trace, output, debug_mappings, with_sentinels),
        Commands::Prove {
            assembly,
            output,
            timeout,
        } => prove(assembly, output, timeout).await,
        Commands::Verify { app_vk, proof } => verify(app_vk, proof).await,
        Commands::Bisect { mappings, timeout } => bisect(mappings, timeout).await,
    }
}

fn trace(code: String, calldata: String, output: PathBuf) -> anyhow::Result<()> {
    let decode = |s: &str| hex::decode(s.strip_prefix("0x").unwrap_or(s));
    let code = decode(&code).context("decoding bytecode hex")?;
    let calldata = decode(&calldata).context("decoding calldata hex")?;

    let (steps, state) = zevm_tracer::trace_bytecode(code, calldata)?;
    let file = TraceFile { steps, state };
    std::fs::write(&output, serde_json::to_string_pretty(&file)?)?;
    info!(
        steps = file.steps.len(),
        output = %output.display(),
        "trace written"
    );
    Ok(())
}

fn transpile(
    trace_path: PathBuf,
    output: PathBuf,
    debug_mappings: Option<PathBuf>,
    with_sentinels: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&trace_path)
        .with_context(|| format!("reading {}", trace_path.display()))?;
    let trace: TraceFile = serde_json::from_str(&raw).context("parsing trace file")?;

    let started = Instant::now();
    let mut transpiler = Transpiler::new(TranspilerConfig::default());
    transpiler
        .process_execution(&trace.steps, &trace.state)
        .context("transpiling trace")?;

    if let Some(path) = &debug_mappings {
        transpiler.save_debug_mappings(path)?;
        info!(path = %path.display(), "debug mappings written");
    }

    let assembly = transpiler.to_assembly();
    let text = if with_sentinels {
        assembly.to_debug_assembly()
    } else {
        assembly.to_toolchain_assembly()
    };
    std::fs::write(&output, text)?;
    info!(
        steps = trace.steps.len(),
        instructions = assembly.instructions.len(),
        elapsed_ms = started.elapsed().as_millis(),
        output = %output.display(),
        "transpilation complete"
    );
    Ok(())
}

async fn prove(assembly: PathBuf, output: PathBuf, timeout: Option<u64>) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&assembly)
        .with_context(|| format!("reading {}", assembly.display()))?;
    let config = ProverConfig {
        deadline: timeout.map(Duration::from_secs),
        ..ProverConfig::default()
    };
    let artifacts = ZkProver::with_config(text, config).prove().await?;

    let results = ResultsFile {
        app_vk: hex::encode(&artifacts.app_vk),
        proof: hex::encode(&artifacts.proof),
        build_time_ms: artifacts.timings.build_ms,
        keygen_time_ms: artifacts.timings.keygen_ms,
        prove_time_ms: artifacts.timings.prove_ms,
        total_time_ms: artifacts.timings.total_ms,
    };
    std::fs::write(&output, serde_json::to_string_pretty(&results)?)?;
    info!(output = %output.display(), "proof written");
    Ok(())
}

async fn verify(app_vk: PathBuf, proof: PathBuf) -> anyhow::Result<()> {
    let vk_bytes = std::fs::read(&app_vk)?;
    let proof_bytes = std::fs::read(&proof)?;
    let result = zevm_prover::verify(&vk_bytes, &proof_bytes, &ProverConfig::default()).await?;
    if result.valid {
        println!("verification successful");
        Ok(())
    } else {
        bail!("verification failed: {}", result.stdout)
    }
}

/// Rebuild and re-prove successively longer mapping prefixes, binary
/// searching for the first EVM step whose emission the prover rejects.
async fn bisect(mappings_path: PathBuf, timeout: u64) -> anyhow::Result<()> {
    let mappings = load_mappings(&mappings_path)?;
    if mappings.is_empty() {
        bail!("no mappings in {}", mappings_path.display());
    }
    println!("total EVM steps: {}", mappings.len());

    let mut left = 0usize;
    let mut right = mappings.len() - 1;
    let mut last_working: Option<usize> = None;

    while left <= right {
        let mid = (left + right) / 2;
        print!("probing steps 0..={mid} ... ");

        let assembly = assembly_from_prefix(&mappings, mid);
        let config = ProverConfig {
            deadline: Some(Duration::from_secs(timeout)),
            ..ProverConfig::default()
        };
        let probe = ZkProver::with_config(assembly.to_toolchain_assembly(), config);
        let started = Instant::now();
        match probe.prove().await {
            Ok(_) => {
                println!("ok ({:?})", started.elapsed());
                last_working = Some(mid);
                left = mid + 1;
            }
            Err(err) => {
                println!("failed ({err})");
                if mid == 0 {
                    break;
                }
                right = mid - 1;
            }
        }
    }

    match last_working {
        None => println!(
            "first step already fails: {} [depth {}]",
            mappings[0].evm_opcode, mappings[0].call_depth
        ),
        Some(last) if last == mappings.len() - 1 => {
            println!("all {} steps prove successfully", mappings.len())
        }
        Some(last) => {
            let culprit = &mappings[last + 1];
            println!(
                "offending EVM step at index {}: {} [depth {}]",
                last + 1,
                culprit.evm_opcode,
                culprit.call_depth
            );
        }
    }
    Ok(())
}
