//! Client side of the coordinator's control protocol.

use std::net::SocketAddr;

use arbor_core::chunk::num_chunks;
use arbor_core::constants::CHUNK_SIZE;
use arbor_core::{ChunkId, ChunkInfo, ChunkLocation, FileMetadata};
use arbor_protocol::constants::MAX_CHUNK_ID_LEN;
use arbor_protocol::{ControlRequest, ControlResponse};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::debug;

use crate::TransferError;

/// Check that `file_id` can be sent as a single protocol token and that
/// every chunk id of a `size` byte file fits in a STORE packet.
pub fn validate_file_id(file_id: &str, size: u64) -> Result<(), TransferError> {
    let invalid = |reason| {
        Err(TransferError::InvalidFileId {
            file_id: file_id.to_owned(),
            reason,
        })
    };

    if file_id.is_empty() {
        return invalid("file id is empty");
    }
    if file_id.chars().any(char::is_whitespace) {
        return invalid("file id contains whitespace");
    }

    let last = ChunkId::new(file_id, num_chunks(size, CHUNK_SIZE).saturating_sub(1));
    if last.as_bytes().len() > MAX_CHUNK_ID_LEN {
        return invalid("chunk ids would exceed 255 bytes");
    }
    Ok(())
}

/// One request/response line exchange at a time over a single connection.
pub struct ControlClient {
    lines: Framed<TcpStream, LinesCodec>,
}

impl ControlClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, TransferError> {
        let stream = TcpStream::connect(addr).await?;
        debug!("Connected to coordinator at {addr}");
        Ok(Self {
            lines: Framed::new(stream, LinesCodec::new()),
        })
    }

    pub async fn request(&mut self, request: ControlRequest) -> Result<ControlResponse, TransferError> {
        self.lines.send(request.to_string()).await?;

        let line = self.lines.next().await.ok_or_else(|| {
            TransferError::UnexpectedResponse("coordinator closed the connection".to_owned())
        })??;
        debug!("Coordinator replied: {line}");

        match line.parse::<ControlResponse>()? {
            ControlResponse::Error(message) => Err(TransferError::Coordinator(message)),
            response => Ok(response),
        }
    }

    /// Ask for a placement plan for a `size` byte file. Ids that could not
    /// be stored are rejected before anything is sent.
    pub async fn allocate(&mut self, file_id: &str, size: u64) -> Result<Vec<ChunkInfo>, TransferError> {
        validate_file_id(file_id, size)?;
        let request = ControlRequest::AllocateChunks {
            file_id: file_id.to_owned(),
            size,
        };
        match self.request(request).await? {
            ControlResponse::Allocated { chunks } => Ok(chunks),
            other => Err(TransferError::UnexpectedResponse(other.to_string())),
        }
    }

    pub async fn lookup(&mut self, file_id: &str) -> Result<FileMetadata, TransferError> {
        validate_file_id(file_id, 0)?;
        let request = ControlRequest::LookupFile {
            file_id: file_id.to_owned(),
        };
        match self.request(request).await? {
            ControlResponse::FileMetadata(metadata) if metadata.file_id == file_id => Ok(metadata),
            other => Err(TransferError::UnexpectedResponse(other.to_string())),
        }
    }

    pub async fn register_replica(
        &mut self,
        chunk_id: &ChunkId,
        location: ChunkLocation,
    ) -> Result<(), TransferError> {
        let request = ControlRequest::RegisterChunkReplica {
            chunk_id: chunk_id.clone(),
            location,
        };
        match self.request(request).await? {
            ControlResponse::Registered => Ok(()),
            other => Err(TransferError::UnexpectedResponse(other.to_string())),
        }
    }
}
