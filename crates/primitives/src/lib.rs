//! zevm-primitives: Core value types for the EVM-trace to RISC-V transpiler.
//!
//! This crate provides:
//! - `Word256`: the 256-bit EVM word as eight 32-bit limbs
//! - Byte-order conversions matching the emitted data-section layout

pub mod word256;

pub use word256::{Word256, WordParseError, LIMBS, WORD_BYTES};
