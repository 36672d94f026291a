//! File table and placement state of the coordinator.

use std::collections::HashMap;

use arbor_core::chunk::num_chunks;
use arbor_core::constants::{CHUNK_SIZE, MAX_FILE_SIZE};
use arbor_core::placement::PlacementEngine;
use arbor_core::topology::Cluster;
use arbor_core::{ChunkId, ChunkLocation, FileMetadata};
use arbor_protocol::constants::{
    ERR_CHUNK_NOT_FOUND, ERR_FILE_NOT_FOUND, ERR_FILE_TOO_LARGE, ERR_UNKNOWN_COMMAND,
};
use arbor_protocol::{ControlRequest, ControlResponse};
use rand::Rng;
use tracing::{debug, error, info, warn};

pub struct CoordinatorState<R> {
    cluster: Cluster,
    placement: PlacementEngine<R>,
    files: HashMap<String, FileMetadata>,
}

impl<R: Rng> CoordinatorState<R> {
    pub fn new(cluster: Cluster, rng: R) -> Self {
        let placement = PlacementEngine::new(cluster.dfs_order().clone(), rng);
        Self {
            cluster,
            placement,
            files: HashMap::new(),
        }
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn file(&self, file_id: &str) -> Option<&FileMetadata> {
        self.files.get(file_id)
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    /// Parse and execute one request line.
    pub fn handle_line(&mut self, line: &str) -> ControlResponse {
        match line.parse::<ControlRequest>() {
            Ok(request) => self.handle_request(request),
            Err(err) => {
                warn!("Rejecting request: {err}");
                ControlResponse::Error(ERR_UNKNOWN_COMMAND.to_owned())
            }
        }
    }

    pub fn handle_request(&mut self, request: ControlRequest) -> ControlResponse {
        debug!("Handling {request}");
        match request {
            ControlRequest::AllocateChunks { file_id, size } => self.allocate(&file_id, size),
            ControlRequest::LookupFile { file_id } => self.lookup(&file_id),
            ControlRequest::RegisterChunkReplica { chunk_id, location } => {
                self.register_replica(&chunk_id, location)
            }
        }
    }

    /// Place every chunk of a `size` byte file, replacing any earlier
    /// allocation under the same id. Files over [`MAX_FILE_SIZE`] are
    /// refused and leave the table untouched.
    pub fn allocate(&mut self, file_id: &str, size: u64) -> ControlResponse {
        if size > MAX_FILE_SIZE {
            warn!("Refusing to allocate {file_id}: {size} bytes exceeds {MAX_FILE_SIZE}");
            return ControlResponse::Error(ERR_FILE_TOO_LARGE.to_owned());
        }

        let count = num_chunks(size, CHUNK_SIZE);
        let placement = self.placement.place(count);

        let locations: Option<Vec<ChunkLocation>> = placement
            .nodes
            .iter()
            .map(|&node| self.cluster.address(node))
            .collect();
        let Some(locations) = locations else {
            error!("Placement for {file_id} chose a node outside the cluster");
            return ControlResponse::Error(ERR_UNKNOWN_COMMAND.to_owned());
        };

        let metadata = FileMetadata::new(file_id, locations);
        if self.files.contains_key(file_id) {
            info!("Replacing allocation of {file_id}");
        }
        info!(
            "Allocated {file_id} ({size} bytes) as {count} chunks from ring offset {}",
            placement.offset
        );

        let chunks = metadata.chunks.clone();
        self.files.insert(file_id.to_owned(), metadata);
        ControlResponse::Allocated { chunks }
    }

    pub fn lookup(&self, file_id: &str) -> ControlResponse {
        match self.files.get(file_id) {
            Some(metadata) => ControlResponse::FileMetadata(metadata.clone()),
            None => {
                debug!("Lookup of unknown file {file_id}");
                ControlResponse::Error(ERR_FILE_NOT_FOUND.to_owned())
            }
        }
    }

    /// Record an additional location of an allocated chunk. Registering a
    /// location twice is a no-op.
    pub fn register_replica(&mut self, chunk_id: &ChunkId, location: ChunkLocation) -> ControlResponse {
        let chunk = chunk_id
            .parts()
            .and_then(|(file_id, _)| self.files.get_mut(file_id))
            .and_then(|metadata| metadata.chunk_mut(chunk_id));

        match chunk {
            Some(chunk) => {
                if chunk.add_location(location) {
                    info!("Registered replica of {chunk_id} at {location}");
                }
                ControlResponse::Registered
            }
            None => {
                warn!("Cannot register replica of unknown chunk {chunk_id}");
                ControlResponse::Error(ERR_CHUNK_NOT_FOUND.to_owned())
            }
        }
    }
}
