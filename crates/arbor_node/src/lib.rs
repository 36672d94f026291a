//! Storage node: keeps chunk payloads on local disk and answers STORE and
//! RETRIEVE packets over UDP.

use std::net::SocketAddr;

use arbor_core::noise::NoiseInjector;
use arbor_core::NodeId;
use arbor_storage::{LocalStorage, StorageError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::info;

pub mod config;
pub mod node;
pub mod server;

pub use config::NodeConfig;
pub use node::{ChunkMetadata, StorageNode};
pub use server::NodeServer;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Node {0} is not part of the cluster")]
    UnknownNode(NodeId),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

/// Build a node from its configuration and bind its socket.
pub async fn bind(config: NodeConfig) -> Result<NodeServer<LocalStorage>, NodeError> {
    let store = LocalStorage::new(&config.store_dir)?;
    info!(
        "Node {} storing chunks in {}",
        config.node_id,
        store.path().display()
    );

    let mut node = StorageNode::new(config.node_id, &config.cluster, store, config.codec.build())?;
    if let Some(probability) = config.noise_probability {
        info!("Node {} simulating channel noise p={probability}", config.node_id);
        node = node.with_noise(NoiseInjector::new(probability, StdRng::from_entropy()));
    }

    NodeServer::bind(node, config.bind_addr).await
}

/// Run a node until its task is cancelled.
pub async fn serve(config: NodeConfig) -> Result<(), NodeError> {
    bind(config).await?.run().await
}
