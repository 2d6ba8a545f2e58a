//! zevm-prover: driver for the external zkVM toolchain.
//!
//! The transpiled assembly is proved by an opaque external toolchain
//! (`cargo openvm ...` by default). This crate materializes the embedded
//! guest-project template into a throwaway workspace, drops the emitted
//! assembly into it, runs the `build`/`keygen`/`prove` phases with captured
//! output and per-phase timings, and reads back the proof and verification
//! key. Verification is a symmetric invocation consuming both artifacts.

pub mod driver;
pub mod workspace;

pub use driver::{
    verify, PhaseTimings, ProofArtifacts, ProverConfig, VerificationResult, ZkProver,
};
pub use workspace::Workspace;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("workspace setup failed: {0}")]
    Setup(String),

    #[error("toolchain build failed: {stderr}")]
    Build { stderr: String },

    #[error("toolchain keygen failed: {stderr}")]
    Keygen { stderr: String },

    #[error("toolchain prove failed: {stderr}")]
    Prove { stderr: String },

    #[error("proof verification failed: {stderr}")]
    Verify { stderr: String },

    #[error("deadline expired during {phase}")]
    Timeout { phase: &'static str },

    #[error("prover run cancelled during {phase}")]
    Cancelled { phase: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProverError>;
