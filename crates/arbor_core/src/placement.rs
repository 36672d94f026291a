//! Chunk placement over the DFS ring.
//!
//! A file's chunks are laid round-robin along the ring starting at a random
//! offset drawn once per file. Given the offset the assignment is fully
//! deterministic.

use rand::Rng;
use tracing::debug;

use crate::node::NodeId;
use crate::topology::DfsOrder;

/// Result of placing one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Ring position of chunk 0.
    pub offset: usize,
    /// Storage node of each chunk, by chunk index.
    pub nodes: Vec<NodeId>,
}

/// Maps chunks to storage nodes. Owns its random source so that tests can
/// seed it.
pub struct PlacementEngine<R> {
    order: DfsOrder,
    rng: R,
}

impl<R: Rng> PlacementEngine<R> {
    pub fn new(order: DfsOrder, rng: R) -> Self {
        Self { order, rng }
    }

    pub fn order(&self) -> &DfsOrder {
        &self.order
    }

    /// Place `num_chunks` chunks starting at a fresh random ring offset.
    pub fn place(&mut self, num_chunks: u64) -> Placement {
        let offset = self.rng.gen_range(0..self.order.len());
        self.place_with_offset(offset, num_chunks)
    }

    /// Chunk `i` goes to `order[(offset + i) mod N]`.
    pub fn place_with_offset(&self, offset: usize, num_chunks: u64) -> Placement {
        let n = self.order.len();
        let offset = offset % n;
        debug!("Placing {num_chunks} chunks from ring offset {offset} of {n}");

        let nodes = (0..num_chunks)
            .map(|i| self.order.at(offset + (i % n as u64) as usize))
            .collect();

        Placement { offset, nodes }
    }
}
