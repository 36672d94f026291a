//! Client of an Arbor cluster: asks the coordinator for a placement plan
//! and moves chunk payloads to and from the storage nodes.

use std::net::SocketAddr;
use std::time::Duration;

use arbor_core::codec::{CodecError, CodecKind};
use arbor_core::constants::DEFAULT_COORDINATOR_PORT;
use arbor_core::ChunkId;
use arbor_protocol::{ControlError, WireError};
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

pub mod control;
pub mod transfer;

pub use control::ControlClient;
pub use transfer::{TransferEngine, TransferEvent};

/// Default time to wait for each ACK or DATA.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Control protocol error: {0}")]
    Control(#[from] ControlError),

    #[error("Control connection error: {0}")]
    ControlStream(#[from] LinesCodecError),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Chunk payload could not be decoded: {0}")]
    Codec(#[from] CodecError),

    #[error("No reply for {chunk_id} after {after:?}")]
    Timeout { chunk_id: ChunkId, after: Duration },

    #[error("Invalid file id `{file_id}`: {reason}")]
    InvalidFileId {
        file_id: String,
        reason: &'static str,
    },

    #[error("Coordinator error: {0}")]
    Coordinator(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub coordinator_addr: SocketAddr,
    /// Local address of the UDP data socket.
    pub bind_addr: SocketAddr,
    pub codec: CodecKind,
    /// How long to wait for each ACK or DATA. `None` waits forever.
    pub ack_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            coordinator_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_COORDINATOR_PORT)),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            codec: CodecKind::default(),
            ack_timeout: Some(DEFAULT_ACK_TIMEOUT),
        }
    }
}
