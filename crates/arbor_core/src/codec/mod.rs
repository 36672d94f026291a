//! Integrity protection for chunk payloads in transit.
//!
//! Payloads are split into fixed-size blocks and every block carries its own
//! check information. Decoding reports whether any block needed correction,
//! and fails outright when a block cannot be repaired.

use std::str::FromStr;

use thiserror::Error;

pub mod parity;
pub mod reed_solomon;

pub use parity::ParityCodec;
pub use reed_solomon::ReedSolomonCodec;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Block {block} is corrupted beyond repair")]
    Uncorrectable { block: usize },

    #[error("Encoded payload has a truncated trailing block of {len} bytes")]
    Truncated { len: usize },
}

/// A decoded payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub data: Vec<u8>,
    /// Set when at least one block had errors that were corrected.
    pub corrupted: bool,
}

pub trait IntegrityCodec {
    /// Protect `data` for transmission.
    fn encode(&self, data: &[u8]) -> Vec<u8>;

    /// Check and repair an encoded payload.
    fn decode(&self, encoded: &[u8]) -> Result<Decoded, CodecError>;
}

/// Selects a codec implementation from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CodecKind {
    #[default]
    ReedSolomon,
    Parity,
}

impl CodecKind {
    pub fn build(self) -> Box<dyn IntegrityCodec + Send + Sync> {
        match self {
            CodecKind::ReedSolomon => Box::new(ReedSolomonCodec::new()),
            CodecKind::Parity => Box::new(ParityCodec),
        }
    }
}

impl FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reed_solomon" | "rs" => Ok(CodecKind::ReedSolomon),
            "parity" => Ok(CodecKind::Parity),
            other => Err(format!(
                "Unknown codec `{other}`. Valid codecs are: reed_solomon, parity"
            )),
        }
    }
}
