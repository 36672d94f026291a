//! Coordinator: plans chunk placement and answers file lookups over a
//! line-oriented TCP protocol. It never sees chunk payloads.

use std::net::SocketAddr;

use arbor_core::topology::Cluster;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

pub mod constants;
pub mod server;
pub mod state;

pub use server::CoordinatorServer;
pub use state::CoordinatorState;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Line codec error: {0}")]
    LinesCodecError(#[from] LinesCodecError),
}

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Address of the TCP listener.
    pub bind_addr: SocketAddr,
    pub cluster: Cluster,
}

/// Bind and run the coordinator until its task is cancelled.
pub async fn serve(config: CoordinatorConfig) -> Result<(), CoordinatorError> {
    CoordinatorServer::bind(config).await?.run().await
}
