use std::path::PathBuf;

use arbor_core::ChunkId;
use thiserror::Error;

pub mod local;
pub mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunk not found: {0}")]
    NotFound(ChunkId),

    #[error("Chunk id cannot be used as a storage key: {0:?}")]
    InvalidChunkId(String),
}

/// Chunk payload storage. Payloads are opaque blobs keyed by chunk id and
/// writes overwrite any previous payload.
pub trait Storage {
    fn read(&self, chunk_id: &ChunkId) -> Result<Vec<u8>, StorageError>;

    fn write(&self, chunk_id: &ChunkId, data: &[u8]) -> Result<PathBuf, StorageError>;
}
