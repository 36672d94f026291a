//! Line-oriented control protocol spoken with the coordinator.
//!
//! Each request and response is a single line of space-separated UTF-8
//! tokens. Lines are framed by the transport; the types here never include
//! the trailing newline.

use std::fmt;
use std::iter::Peekable;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

use arbor_core::{ChunkId, ChunkInfo, ChunkLocation, FileMetadata};
use thiserror::Error;

use crate::constants::{
    CMD_ALLOCATE_CHUNKS, CMD_LOOKUP_FILE, CMD_REGISTER_CHUNK_REPLICA, ERR_UNKNOWN_COMMAND,
};

const RESP_OK: &str = "OK";
const RESP_ALLOCATED: &str = "Allocated";
const RESP_REGISTERED: &str = "Registered";
const RESP_FILE_METADATA: &str = "FILE_METADATA";
const RESP_ERROR: &str = "ERROR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("{ERR_UNKNOWN_COMMAND}: {0}")]
    UnknownCommand(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlRequest {
    /// `ALLOCATE_CHUNKS <fileId> <sizeBytes>`
    AllocateChunks { file_id: String, size: u64 },
    /// `LOOKUP_FILE <fileId>`
    LookupFile { file_id: String },
    /// `REGISTER_CHUNK_REPLICA <chunkId> <ip> <port>`
    RegisterChunkReplica {
        chunk_id: ChunkId,
        location: ChunkLocation,
    },
}

impl FromStr for ControlRequest {
    type Err = ControlError;

    /// Parse a request line. Extra trailing tokens are ignored.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let unknown = || ControlError::UnknownCommand(line.to_owned());
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            [CMD_ALLOCATE_CHUNKS, file_id, size, ..] => Ok(ControlRequest::AllocateChunks {
                file_id: file_id.to_string(),
                size: size.parse().map_err(|_| unknown())?,
            }),
            [CMD_LOOKUP_FILE, file_id, ..] => Ok(ControlRequest::LookupFile {
                file_id: file_id.to_string(),
            }),
            [CMD_REGISTER_CHUNK_REPLICA, chunk_id, ip, port, ..] => {
                let ip: Ipv4Addr = ip.parse().map_err(|_| unknown())?;
                let port: u16 = port.parse().map_err(|_| unknown())?;
                Ok(ControlRequest::RegisterChunkReplica {
                    chunk_id: ChunkId::from(*chunk_id),
                    location: SocketAddrV4::new(ip, port),
                })
            }
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlRequest::AllocateChunks { file_id, size } => {
                write!(f, "{CMD_ALLOCATE_CHUNKS} {file_id} {size}")
            }
            ControlRequest::LookupFile { file_id } => write!(f, "{CMD_LOOKUP_FILE} {file_id}"),
            ControlRequest::RegisterChunkReplica { chunk_id, location } => write!(
                f,
                "{CMD_REGISTER_CHUNK_REPLICA} {chunk_id} {} {}",
                location.ip(),
                location.port()
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlResponse {
    /// `OK Allocated <numChunks> (<chunkId> <ip> <port>)*`
    Allocated { chunks: Vec<ChunkInfo> },
    /// `FILE_METADATA <fileId> (<chunkId> (<ip> <port>)+)*`
    FileMetadata(FileMetadata),
    /// `OK Registered`
    Registered,
    /// `ERROR <message>`
    Error(String),
}

fn write_chunks(f: &mut fmt::Formatter<'_>, chunks: &[ChunkInfo]) -> fmt::Result {
    for chunk in chunks {
        write!(f, " {}", chunk.chunk_id)?;
        for location in &chunk.locations {
            write!(f, " {} {}", location.ip(), location.port())?;
        }
    }
    Ok(())
}

impl fmt::Display for ControlResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlResponse::Allocated { chunks } => {
                write!(f, "{RESP_OK} {RESP_ALLOCATED} {}", chunks.len())?;
                write_chunks(f, chunks)
            }
            ControlResponse::FileMetadata(metadata) => {
                write!(f, "{RESP_FILE_METADATA} {}", metadata.file_id)?;
                write_chunks(f, &metadata.chunks)
            }
            ControlResponse::Registered => write!(f, "{RESP_OK} {RESP_REGISTERED}"),
            ControlResponse::Error(message) => write!(f, "{RESP_ERROR} {message}"),
        }
    }
}

/// Parse `(<chunkId> (<ip> <port>)+)*`. A token that parses as an IPv4
/// address starts another location of the current chunk; anything else
/// starts a new chunk.
fn parse_chunks<'a, I>(tokens: &mut Peekable<I>, line: &str) -> Result<Vec<ChunkInfo>, ControlError>
where
    I: Iterator<Item = &'a str>,
{
    let malformed = || ControlError::MalformedResponse(line.to_owned());
    let mut chunks = Vec::new();

    while let Some(chunk_id) = tokens.next() {
        let mut locations = Vec::new();
        while let Some(ip) = tokens.peek().and_then(|t| t.parse::<Ipv4Addr>().ok()) {
            tokens.next();
            let port = tokens
                .next()
                .and_then(|t| t.parse::<u16>().ok())
                .ok_or_else(malformed)?;
            locations.push(SocketAddrV4::new(ip, port));
        }
        if locations.is_empty() {
            return Err(malformed());
        }
        chunks.push(ChunkInfo {
            chunk_id: ChunkId::from(chunk_id),
            locations,
        });
    }

    Ok(chunks)
}

impl FromStr for ControlResponse {
    type Err = ControlError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || ControlError::MalformedResponse(line.to_owned());
        let line = line.trim();

        if let Some(message) = line.strip_prefix(RESP_ERROR) {
            return Ok(ControlResponse::Error(message.trim().to_owned()));
        }

        let mut tokens = line.split_whitespace().peekable();
        match tokens.next() {
            Some(RESP_OK) => match tokens.next() {
                Some(RESP_REGISTERED) => Ok(ControlResponse::Registered),
                Some(RESP_ALLOCATED) => {
                    let count: usize = tokens
                        .next()
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(malformed)?;
                    let chunks = parse_chunks(&mut tokens, line)?;
                    if chunks.len() != count {
                        return Err(malformed());
                    }
                    Ok(ControlResponse::Allocated { chunks })
                }
                _ => Err(malformed()),
            },
            Some(RESP_FILE_METADATA) => {
                let file_id = tokens.next().ok_or_else(malformed)?.to_owned();
                let chunks = parse_chunks(&mut tokens, line)?;
                Ok(ControlResponse::FileMetadata(FileMetadata { file_id, chunks }))
            }
            _ => Err(malformed()),
        }
    }
}
