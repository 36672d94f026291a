use std::net::SocketAddr;
use std::path::PathBuf;

use arbor_core::codec::CodecKind;
use arbor_core::topology::Cluster;
use arbor_core::NodeId;

/// Configuration of a single storage node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Id of this node in the cluster.
    pub node_id: NodeId,
    /// The fixed cluster layout, shared by every node and the coordinator.
    pub cluster: Cluster,
    /// Local address to bind the UDP socket to.
    pub bind_addr: SocketAddr,
    /// Directory holding this node's chunk files.
    pub store_dir: PathBuf,
    /// Integrity codec used on chunk payloads.
    pub codec: CodecKind,
    /// Simulated channel noise applied to incoming STORE payloads.
    pub noise_probability: Option<f64>,
}
