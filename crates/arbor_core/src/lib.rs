//! Core types and algorithms shared by every Arbor component: node and chunk
//! identifiers, the static node tree with its placement ring, and the
//! integrity codecs used to protect chunk payloads in transit.

pub mod chunk;
pub mod codec;
pub mod constants;
pub mod node;
pub mod noise;
pub mod placement;
pub mod topology;

pub use chunk::{ChunkId, ChunkInfo, ChunkLocation, FileMetadata};
pub use node::NodeId;
