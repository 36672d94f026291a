//! Reed-Solomon RS(255, 223) error correction.
//!
//! Each codeword carries `FEC_K` data bytes followed by `FEC_PARITY` parity
//! bytes and can repair up to `FEC_T` corrupted bytes. The last block of a
//! payload is a shortened codeword holding only the remaining data bytes, so
//! no padding is transmitted and payload lengths survive a roundtrip.

use reed_solomon::{Decoder, Encoder};
use tracing::debug;

use super::{CodecError, Decoded, IntegrityCodec};
use crate::constants::{FEC_K, FEC_N, FEC_PARITY};

pub struct ReedSolomonCodec {
    encoder: Encoder,
    decoder: Decoder,
}

impl ReedSolomonCodec {
    pub fn new() -> Self {
        Self {
            encoder: Encoder::new(FEC_PARITY),
            decoder: Decoder::new(FEC_PARITY),
        }
    }
}

impl Default for ReedSolomonCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Length of the encoded form of a `len` byte payload.
pub fn encoded_len(len: usize) -> usize {
    let full = len / FEC_K;
    let rem = len % FEC_K;
    full * FEC_N + if rem > 0 { rem + FEC_PARITY } else { 0 }
}

impl IntegrityCodec for ReedSolomonCodec {
    fn encode(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(encoded_len(data.len()));
        for block in data.chunks(FEC_K) {
            let codeword = self.encoder.encode(block);
            out.extend_from_slice(&codeword);
        }
        out
    }

    fn decode(&self, encoded: &[u8]) -> Result<Decoded, CodecError> {
        let mut data = Vec::with_capacity(encoded.len());
        let mut corrupted = false;

        for (idx, codeword) in encoded.chunks(FEC_N).enumerate() {
            if codeword.len() <= FEC_PARITY {
                return Err(CodecError::Truncated {
                    len: codeword.len(),
                });
            }

            if !self.decoder.is_corrupted(codeword) {
                data.extend_from_slice(&codeword[..codeword.len() - FEC_PARITY]);
                continue;
            }

            let mut block = codeword.to_vec();
            let repaired = self
                .decoder
                .correct(&mut block, None)
                .map_err(|_| CodecError::Uncorrectable { block: idx })?;
            debug!("Corrected errors in block {idx}");

            corrupted = true;
            data.extend_from_slice(repaired.data());
        }

        Ok(Decoded { data, corrupted })
    }
}
