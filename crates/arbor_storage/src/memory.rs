//! In-memory storage, mostly for testing purposes

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use arbor_core::ChunkId;

use crate::{Storage, StorageError};

/// In-memory storage implementation.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<ChunkId, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of chunks stored.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Check if storage is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a chunk exists.
    pub fn contains(&self, chunk_id: &ChunkId) -> bool {
        self.data
            .read()
            .map(|d| d.contains_key(chunk_id))
            .unwrap_or(false)
    }
}

fn poisoned() -> StorageError {
    StorageError::IoError(std::io::Error::other("memory store lock poisoned"))
}

impl Storage for MemoryStorage {
    fn read(&self, chunk_id: &ChunkId) -> Result<Vec<u8>, StorageError> {
        let data = self.data.read().map_err(|_| poisoned())?;
        data.get(chunk_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(chunk_id.clone()))
    }

    fn write(&self, chunk_id: &ChunkId, data: &[u8]) -> Result<PathBuf, StorageError> {
        let mut storage = self.data.write().map_err(|_| poisoned())?;
        storage.insert(chunk_id.clone(), data.to_vec());

        // Return a fake path since we're in memory
        Ok(PathBuf::from(format!("memory://{chunk_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());

        let id = ChunkId::new("f", 0);
        let path = storage.write(&id, b"Hello, World!").unwrap();
        assert_eq!(path, PathBuf::from("memory://f_chunk_0"));
        assert_eq!(storage.len(), 1);
        assert!(storage.contains(&id));
        assert_eq!(storage.read(&id).unwrap(), b"Hello, World!");

        storage.write(&id, b"again").unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.read(&id).unwrap(), b"again");
    }

    #[test]
    fn test_memory_storage_missing_chunk() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.read(&ChunkId::from("missing")),
            Err(StorageError::NotFound(_))
        ));
    }
}
