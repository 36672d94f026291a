//! Chunk identifiers and the per-file chunk location table kept by the
//! coordinator.

use std::fmt;
use std::net::SocketAddrV4;

const CHUNK_ID_SEPARATOR: &str = "_chunk_";

/// Address of a storage node holding a copy of a chunk.
pub type ChunkLocation = SocketAddrV4;

/// Number of chunks needed to hold `file_size` bytes, i.e.
/// `ceil(file_size / chunk_size)`.
pub fn num_chunks(file_size: u64, chunk_size: u64) -> u64 {
    file_size.div_ceil(chunk_size)
}

/// Identifier of a chunk, formatted as `<fileId>_chunk_<index>`.
///
/// Storage nodes treat the id as an opaque key, so any string received over
/// the wire is accepted; [`ChunkId::new`] builds the canonical form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(String);

impl ChunkId {
    /// Build the id of chunk `index` of `file_id`.
    pub fn new(file_id: &str, index: u64) -> Self {
        ChunkId(format!("{file_id}{CHUNK_ID_SEPARATOR}{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Split a canonical id back into its file id and chunk index.
    pub fn parts(&self) -> Option<(&str, u64)> {
        let (file_id, index) = self.0.rsplit_once(CHUNK_ID_SEPARATOR)?;
        let index = index.parse().ok()?;
        Some((file_id, index))
    }

    /// Chunk index, if the id is in canonical form.
    pub fn index(&self) -> Option<u64> {
        self.parts().map(|(_, index)| index)
    }
}

impl From<String> for ChunkId {
    fn from(value: String) -> Self {
        ChunkId(value)
    }
}

impl From<&str> for ChunkId {
    fn from(value: &str) -> Self {
        ChunkId(value.to_owned())
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chunk and every node known to hold it. The first location is the
/// primary chosen by placement; later ones are registered replicas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    pub chunk_id: ChunkId,
    pub locations: Vec<ChunkLocation>,
}

impl ChunkInfo {
    pub fn primary(&self) -> Option<ChunkLocation> {
        self.locations.first().copied()
    }

    /// Record an extra location. Returns `false` if it was already known.
    pub fn add_location(&mut self, location: ChunkLocation) -> bool {
        if self.locations.contains(&location) {
            return false;
        }
        self.locations.push(location);
        true
    }
}

/// Placement metadata of a whole file, chunks in byte offset order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMetadata {
    pub file_id: String,
    pub chunks: Vec<ChunkInfo>,
}

impl FileMetadata {
    /// Build the metadata of `file_id` whose chunk `i` is stored at
    /// `primaries[i]`.
    pub fn new(file_id: &str, primaries: impl IntoIterator<Item = ChunkLocation>) -> Self {
        let chunks = primaries
            .into_iter()
            .enumerate()
            .map(|(index, location)| ChunkInfo {
                chunk_id: ChunkId::new(file_id, index as u64),
                locations: vec![location],
            })
            .collect();

        FileMetadata {
            file_id: file_id.to_owned(),
            chunks,
        }
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk(&self, chunk_id: &ChunkId) -> Option<&ChunkInfo> {
        self.chunks.iter().find(|c| &c.chunk_id == chunk_id)
    }

    pub fn chunk_mut(&mut self, chunk_id: &ChunkId) -> Option<&mut ChunkInfo> {
        self.chunks.iter_mut().find(|c| &c.chunk_id == chunk_id)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::constants::CHUNK_SIZE;

    fn loc(port: u16) -> ChunkLocation {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)
    }

    #[test]
    fn test_num_chunks_rounds_up() {
        assert_eq!(num_chunks(0, CHUNK_SIZE), 0);
        assert_eq!(num_chunks(1, CHUNK_SIZE), 1);
        assert_eq!(num_chunks(CHUNK_SIZE, CHUNK_SIZE), 1);
        assert_eq!(num_chunks(CHUNK_SIZE + 1, CHUNK_SIZE), 2);
        assert_eq!(num_chunks(20_000, 8192), 3);
    }

    #[test]
    fn test_num_chunks_matches_ceiling_for_many_sizes() {
        for size in (0..100_000u64).step_by(997) {
            let expected = (size as f64 / CHUNK_SIZE as f64).ceil() as u64;
            assert_eq!(num_chunks(size, CHUNK_SIZE), expected, "size {size}");
        }
    }

    #[test]
    fn test_chunk_id_format_and_parts() {
        let id = ChunkId::new("report.pdf", 7);
        assert_eq!(id.as_str(), "report.pdf_chunk_7");
        assert_eq!(id.parts(), Some(("report.pdf", 7)));
        assert_eq!(id.index(), Some(7));

        // File ids may themselves contain the separator
        let nested = ChunkId::new("a_chunk_b", 2);
        assert_eq!(nested.parts(), Some(("a_chunk_b", 2)));

        assert_eq!(ChunkId::from("opaque").index(), None);
    }

    #[test]
    fn test_file_metadata_chunk_order() {
        let meta = FileMetadata::new("f", [loc(5003), loc(5001), loc(5007)]);
        assert_eq!(meta.num_chunks(), 3);
        for (i, chunk) in meta.chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, ChunkId::new("f", i as u64));
            assert_eq!(chunk.locations.len(), 1);
        }
        assert_eq!(meta.chunks[1].primary(), Some(loc(5001)));
    }

    #[test]
    fn test_add_location_is_idempotent() {
        let mut meta = FileMetadata::new("f", [loc(5000)]);
        let chunk = meta.chunk_mut(&ChunkId::new("f", 0)).unwrap();

        assert!(!chunk.add_location(loc(5000)));
        assert!(chunk.add_location(loc(5004)));
        assert!(!chunk.add_location(loc(5004)));
        assert_eq!(chunk.locations, vec![loc(5000), loc(5004)]);
        assert_eq!(chunk.primary(), Some(loc(5000)));
    }
}
