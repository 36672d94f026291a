//! Detection-only codec: one XOR parity byte after every `PARITY_BLOCK_SIZE`
//! data bytes. The last block may be shorter. A mismatch cannot be repaired,
//! so any detected error fails the decode.

use super::{CodecError, Decoded, IntegrityCodec};
use crate::constants::PARITY_BLOCK_SIZE;

const ENCODED_BLOCK_SIZE: usize = PARITY_BLOCK_SIZE + 1;

#[derive(Clone, Copy, Debug, Default)]
pub struct ParityCodec;

fn parity(block: &[u8]) -> u8 {
    block.iter().fold(0, |acc, b| acc ^ b)
}

impl IntegrityCodec for ParityCodec {
    fn encode(&self, data: &[u8]) -> Vec<u8> {
        let blocks = data.len().div_ceil(PARITY_BLOCK_SIZE);
        let mut out = Vec::with_capacity(data.len() + blocks);
        for block in data.chunks(PARITY_BLOCK_SIZE) {
            out.extend_from_slice(block);
            out.push(parity(block));
        }
        out
    }

    fn decode(&self, encoded: &[u8]) -> Result<Decoded, CodecError> {
        let mut data = Vec::with_capacity(encoded.len());

        for (idx, block) in encoded.chunks(ENCODED_BLOCK_SIZE).enumerate() {
            let Some((&check, payload)) = block.split_last().filter(|(_, p)| !p.is_empty())
            else {
                return Err(CodecError::Truncated { len: block.len() });
            };
            if parity(payload) != check {
                return Err(CodecError::Uncorrectable { block: idx });
            }
            data.extend_from_slice(payload);
        }

        Ok(Decoded {
            data,
            corrupted: false,
        })
    }
}
