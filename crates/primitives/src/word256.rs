//! 256-bit EVM words as eight 32-bit limbs.
//!
//! The limb order matches the emitted data-section layout: limb 0 holds bits
//! 255..224 (the most significant word sits at the lowest address), and each
//! limb is stored little-endian when serialized as a `.word` directive. The
//! 256-bit helper library and the transpiler's stack manipulation both rely
//! on this ordering.

use core::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of 32-bit limbs in a word.
pub const LIMBS: usize = 8;

/// Number of bytes in a word.
pub const WORD_BYTES: usize = 32;

/// An unsigned 256-bit integer.
///
/// No arithmetic is implemented here: all 256-bit math in emitted programs is
/// performed by the linked assembly helper library, and the transpiler itself
/// only moves values around.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Word256 {
    /// Limbs in big-endian order: `limbs[0]` is bits 255..224.
    limbs: [u32; LIMBS],
}

/// Error parsing a hex word.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WordParseError {
    #[error("hex string longer than 64 digits: {0}")]
    TooLong(usize),

    #[error("invalid hex digit: {0}")]
    InvalidDigit(char),
}

impl Word256 {
    /// The zero word.
    pub const ZERO: Self = Self { limbs: [0; LIMBS] };

    /// The all-ones word, `2^256 - 1`.
    pub const MAX: Self = Self {
        limbs: [u32::MAX; LIMBS],
    };

    /// Construct from limbs in big-endian limb order.
    pub const fn from_limbs(limbs: [u32; LIMBS]) -> Self {
        Self { limbs }
    }

    /// Construct from a `u64`.
    pub const fn from_u64(value: u64) -> Self {
        let mut limbs = [0u32; LIMBS];
        limbs[LIMBS - 1] = value as u32;
        limbs[LIMBS - 2] = (value >> 32) as u32;
        Self { limbs }
    }

    /// Construct from 32 big-endian bytes.
    pub fn from_be_bytes(bytes: [u8; WORD_BYTES]) -> Self {
        let mut limbs = [0u32; LIMBS];
        for (i, limb) in limbs.iter_mut().enumerate() {
            *limb = u32::from_be_bytes([
                bytes[i * 4],
                bytes[i * 4 + 1],
                bytes[i * 4 + 2],
                bytes[i * 4 + 3],
            ]);
        }
        Self { limbs }
    }

    /// Construct from up to 32 big-endian bytes, right-aligned and
    /// zero-padded on the left (EVM `SetBytes` semantics, as used for PUSH
    /// immediates and calldata slices).
    pub fn from_be_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; WORD_BYTES];
        let len = bytes.len().min(WORD_BYTES);
        let src = &bytes[bytes.len() - len..];
        buf[WORD_BYTES - len..].copy_from_slice(src);
        Self::from_be_bytes(buf)
    }

    /// Serialize to 32 big-endian bytes.
    pub fn to_be_bytes(self) -> [u8; WORD_BYTES] {
        let mut bytes = [0u8; WORD_BYTES];
        for (i, limb) in self.limbs.iter().enumerate() {
            bytes[i * 4..(i + 1) * 4].copy_from_slice(&limb.to_be_bytes());
        }
        bytes
    }

    /// The limbs in emission order (most significant first).
    pub const fn limbs(&self) -> [u32; LIMBS] {
        self.limbs
    }

    /// Whether the word is zero.
    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&l| l == 0)
    }

    /// The low 64 bits of the word.
    pub fn low_u64(&self) -> u64 {
        (self.limbs[LIMBS - 1] as u64) | ((self.limbs[LIMBS - 2] as u64) << 32)
    }

    /// Whether the word fits in a `u64`.
    pub fn fits_u64(&self) -> bool {
        self.limbs[..LIMBS - 2].iter().all(|&l| l == 0)
    }

    /// The low 64 bits as a `usize`, or `None` if the word exceeds
    /// `usize::MAX`. Used for calldata offsets.
    pub fn to_usize(&self) -> Option<usize> {
        if !self.fits_u64() {
            return None;
        }
        usize::try_from(self.low_u64()).ok()
    }

    /// Parse from a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, WordParseError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() > 64 {
            return Err(WordParseError::TooLong(digits.len()));
        }
        let mut bytes = [0u8; WORD_BYTES];
        // Odd-length strings are implicitly left-padded with one zero digit.
        let padded: String = if digits.len() % 2 == 1 {
            format!("0{digits}")
        } else {
            digits.to_string()
        };
        let raw = hex::decode(&padded).map_err(|_| {
            let bad = digits
                .chars()
                .find(|c| !c.is_ascii_hexdigit())
                .unwrap_or('?');
            WordParseError::InvalidDigit(bad)
        })?;
        bytes[WORD_BYTES - raw.len()..].copy_from_slice(&raw);
        Ok(Self::from_be_bytes(bytes))
    }

    /// Minimal hex representation with a `0x` prefix (no leading zeros,
    /// `0x0` for zero). Storage-section keys use this form.
    pub fn to_hex(&self) -> String {
        let full = hex::encode(self.to_be_bytes());
        let trimmed = full.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{trimmed}")
        }
    }
}

impl From<u64> for Word256 {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl fmt::Display for Word256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Word256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word256({})", self.to_hex())
    }
}
