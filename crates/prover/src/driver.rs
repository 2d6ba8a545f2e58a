//! Toolchain invocation: build, keygen, prove, verify.
//!
//! Each phase is one child process run in the workspace with stdout/stderr
//! captured. A non-zero exit maps to the phase's error carrying the
//! captured stderr. The whole run observes one optional deadline; on
//! expiry (or cancellation) in-flight children are killed.

use crate::workspace::Workspace;
use crate::{ProverError, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{info, warn};

/// Relative path of the proof artifact after `prove app`.
const PROOF_PATH: &str = "prover.app.proof";

/// Relative path of the app verification key after `keygen`.
const APP_VK_PATH: &str = "target/openvm/app.vk";

/// Prover driver configuration.
#[derive(Debug, Clone)]
pub struct ProverConfig {
    /// Toolchain command prefix; phase subcommands are appended.
    pub toolchain: Vec<String>,
    /// Wall-clock budget for the whole run (all phases together).
    pub deadline: Option<Duration>,
    /// Cooperative cancellation: flips to `true` to abort the run.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            toolchain: vec!["cargo".to_string(), "openvm".to_string()],
            deadline: None,
            cancel: None,
        }
    }
}

/// Wall-clock timings per phase, in milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimings {
    pub build_ms: u128,
    pub keygen_ms: u128,
    pub prove_ms: u128,
    pub read_ms: u128,
    pub total_ms: u128,
}

/// A successful proving run.
#[derive(Debug)]
pub struct ProofArtifacts {
    pub proof: Vec<u8>,
    pub app_vk: Vec<u8>,
    pub stdout: String,
    pub timings: PhaseTimings,
}

/// Outcome of a verification run.
#[derive(Debug)]
pub struct VerificationResult {
    pub valid: bool,
    pub stdout: String,
}

/// Drives the external toolchain over one emitted assembly file.
pub struct ZkProver {
    assembly: String,
    config: ProverConfig,
}

impl ZkProver {
    pub fn new(assembly: String) -> Self {
        Self::with_config(assembly, ProverConfig::default())
    }

    pub fn with_config(assembly: String, config: ProverConfig) -> Self {
        Self { assembly, config }
    }

    /// Run `build`, `keygen` and `prove app`, then read the artifacts.
    pub async fn prove(&self) -> Result<ProofArtifacts> {
        let started = Instant::now();
        let deadline = self.config.deadline.map(|d| started + d);
        let workspace = Workspace::create(&self.assembly)?;

        let build_start = Instant::now();
        self.run_phase(&workspace, &["build"], "build", deadline)
            .await?;
        let build_ms = build_start.elapsed().as_millis();

        let keygen_start = Instant::now();
        self.run_phase(&workspace, &["keygen"], "keygen", deadline)
            .await?;
        let keygen_ms = keygen_start.elapsed().as_millis();

        let prove_start = Instant::now();
        let stdout = self
            .run_phase(&workspace, &["prove", "app"], "prove", deadline)
            .await?;
        let prove_ms = prove_start.elapsed().as_millis();

        let read_start = Instant::now();
        let proof = tokio::fs::read(workspace.join(PROOF_PATH)).await?;
        let app_vk = tokio::fs::read(workspace.join(APP_VK_PATH)).await?;
        let read_ms = read_start.elapsed().as_millis();

        let timings = PhaseTimings {
            build_ms,
            keygen_ms,
            prove_ms,
            read_ms,
            total_ms: started.elapsed().as_millis(),
        };
        info!(
            proof_bytes = proof.len(),
            vk_bytes = app_vk.len(),
            total_ms = timings.total_ms,
            "proof generated"
        );

        Ok(ProofArtifacts {
            proof,
            app_vk,
            stdout,
            timings,
        })
    }

    async fn run_phase(
        &self,
        workspace: &Workspace,
        args: &[&str],
        phase: &'static str,
        deadline: Option<Instant>,
    ) -> Result<String> {
        let output = run_toolchain(
            &self.config,
            workspace.root(),
            args,
            phase,
            deadline,
        )
        .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(phase, %stderr, "toolchain phase failed");
            return Err(match phase {
                "build" => ProverError::Build { stderr },
                "keygen" => ProverError::Keygen { stderr },
                _ => ProverError::Prove { stderr },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Verify a proof against its verification key: artifacts are written to a
/// scratch directory and the toolchain's `verify app` subcommand consumes
/// them via `--app-vk`/`--proof`.
pub async fn verify(
    app_vk: &[u8],
    proof: &[u8],
    config: &ProverConfig,
) -> Result<VerificationResult> {
    let dir = tempfile::TempDir::with_prefix("zevm-verify-")
        .map_err(|err| ProverError::Setup(err.to_string()))?;
    let vk_path = dir.path().join("app.vk");
    let proof_path = dir.path().join("proof.app.proof");
    tokio::fs::write(&vk_path, app_vk).await?;
    tokio::fs::write(&proof_path, proof).await?;

    let deadline = config.deadline.map(|d| Instant::now() + d);
    let args = [
        "verify",
        "app",
        "--app-vk",
        vk_path.to_str().expect("utf-8 temp path"),
        "--proof",
        proof_path.to_str().expect("utf-8 temp path"),
    ];
    let output = run_toolchain(config, dir.path(), &args, "verify", deadline).await?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(ProverError::Verify { stderr });
    }
    Ok(VerificationResult {
        valid: true,
        stdout,
    })
}

async fn run_toolchain(
    config: &ProverConfig,
    cwd: &Path,
    args: &[&str],
    phase: &'static str,
    deadline: Option<Instant>,
) -> Result<std::process::Output> {
    let (program, prefix) = config
        .toolchain
        .split_first()
        .ok_or_else(|| ProverError::Setup("empty toolchain command".to_string()))?;

    let mut command = Command::new(program);
    command
        .args(prefix)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!(phase, ?args, "running toolchain phase");
    let child = command.output();
    tokio::pin!(child);

    let mut cancel = config.cancel.clone();
    let remaining = match deadline {
        Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
                return Err(ProverError::Timeout { phase });
            }
            Some(deadline - now)
        }
        None => None,
    };

    tokio::select! {
        output = &mut child => Ok(output?),
        _ = cancelled(&mut cancel) => Err(ProverError::Cancelled { phase }),
        _ = sleep_until(remaining) => Err(ProverError::Timeout { phase }),
    }
}

async fn sleep_until(remaining: Option<Duration>) {
    match remaining {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without cancelling: never fires.
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending().await,
    }
}
