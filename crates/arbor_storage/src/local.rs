//! Local storage implementation

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use arbor_core::ChunkId;
use tracing::debug;

use crate::{Storage, StorageError};

/// Stores each chunk as `<chunkId>.bin` in a node-private directory.
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    /// Open the store at `store_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(store_dir: P) -> Result<Self, StorageError> {
        let path = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Get a reference to the path of the chunk store.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn chunk_path(&self, chunk_id: &ChunkId) -> Result<PathBuf, StorageError> {
        let id = chunk_id.as_str();
        let invalid = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\', '\0']);
        if invalid {
            return Err(StorageError::InvalidChunkId(id.to_owned()));
        }
        Ok(self.path.join(format!("{id}.bin")))
    }
}

impl Storage for LocalStorage {
    fn read(&self, chunk_id: &ChunkId) -> Result<Vec<u8>, StorageError> {
        let path = self.chunk_path(chunk_id)?;
        fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound(chunk_id.clone()),
            _ => StorageError::IoError(err),
        })
    }

    fn write(&self, chunk_id: &ChunkId, data: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.chunk_path(chunk_id)?;
        debug!("Writing chunk {chunk_id} ({} bytes) to store", data.len());
        fs::write(&path, data)?;
        Ok(path)
    }
}
