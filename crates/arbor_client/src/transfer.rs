//! Chunk-by-chunk upload and download against the storage nodes.
//!
//! Transfers are strictly sequential: a chunk is sent, the engine waits for
//! the matching ACK or DATA, and only then moves to the next chunk.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use arbor_core::codec::IntegrityCodec;
use arbor_core::constants::CHUNK_SIZE;
use arbor_core::{ChunkId, ChunkInfo, ChunkLocation};
use arbor_protocol::wire::{Ack, Data, Retrieve, Store};
use arbor_protocol::Packet;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::control::ControlClient;
use crate::{ClientConfig, TransferError};

const RECV_BUFFER_SIZE: usize = 65536;

/// Progress notifications of a transfer, in the order they happen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferEvent {
    /// A node acknowledged a STORE.
    ChunkAcked {
        chunk_id: ChunkId,
        next: SocketAddrV4,
        corrupted: bool,
    },
    /// A node answered a RETRIEVE and the payload was decoded.
    ChunkReceived {
        chunk_id: ChunkId,
        next: SocketAddrV4,
        corrupted: bool,
        len: usize,
    },
    Progress {
        done: u64,
        total: u64,
    },
    Completed {
        file_id: String,
        bytes: u64,
    },
}

pub struct TransferEngine {
    coordinator: SocketAddr,
    codec: Box<dyn IntegrityCodec + Send + Sync>,
    ack_timeout: Option<Duration>,
    socket: UdpSocket,
}

impl TransferEngine {
    pub async fn new(config: ClientConfig) -> Result<Self, TransferError> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        debug!("Client data socket bound to {}", socket.local_addr()?);

        Ok(Self {
            coordinator: config.coordinator_addr,
            codec: config.codec.build(),
            ack_timeout: config.ack_timeout,
            socket,
        })
    }

    /// Upload the file at `path` under `file_id`. Returns the number of
    /// bytes sent.
    pub async fn upload<F>(
        &self,
        path: &Path,
        file_id: &str,
        mut on_event: F,
    ) -> Result<u64, TransferError>
    where
        F: FnMut(TransferEvent),
    {
        let mut file = File::open(path).await?;
        let size = file.metadata().await?.len();

        let chunks = ControlClient::connect(self.coordinator)
            .await?
            .allocate(file_id, size)
            .await?;
        let total = chunks.len() as u64;
        info!("Uploading {} ({size} bytes) as {total} chunks", path.display());

        let mut sent = 0u64;
        for (i, chunk) in chunks.iter().enumerate() {
            let target = primary(chunk)?;
            let hint = chunks
                .get(i + 1)
                .and_then(ChunkInfo::primary)
                .unwrap_or(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

            let mut payload = Vec::with_capacity(CHUNK_SIZE as usize);
            (&mut file).take(CHUNK_SIZE).read_to_end(&mut payload).await?;
            sent += payload.len() as u64;

            let store = Packet::Store(Store {
                chunk_id: chunk.chunk_id.clone(),
                next: hint,
                data: Bytes::from(self.codec.encode(&payload)),
            });
            self.send(&store, target).await?;
            debug!("Sent {} ({} bytes) to {target}", chunk.chunk_id, payload.len());

            let Ack {
                chunk_id,
                next,
                corrupted,
            } = self
                .wait_for(&chunk.chunk_id, target, |packet| match packet {
                    Packet::Ack(ack) => Some(ack),
                    _ => None,
                })
                .await?;
            if corrupted {
                warn!("Node {target} reported {chunk_id} as corrupted");
            }

            on_event(TransferEvent::ChunkAcked {
                chunk_id,
                next,
                corrupted,
            });
            on_event(TransferEvent::Progress {
                done: i as u64 + 1,
                total,
            });
        }

        info!("Upload of {file_id} completed");
        on_event(TransferEvent::Completed {
            file_id: file_id.to_owned(),
            bytes: sent,
        });
        Ok(sent)
    }

    /// Download `file_id` into `output`, truncating it first. Returns the
    /// number of bytes written.
    pub async fn download<F>(
        &self,
        file_id: &str,
        output: &Path,
        mut on_event: F,
    ) -> Result<u64, TransferError>
    where
        F: FnMut(TransferEvent),
    {
        let metadata = ControlClient::connect(self.coordinator)
            .await?
            .lookup(file_id)
            .await?;
        let total = metadata.chunks.len() as u64;
        info!("Downloading {file_id} ({total} chunks) to {}", output.display());

        let mut file = File::create(output).await?;
        let mut written = 0u64;

        for (i, chunk) in metadata.chunks.iter().enumerate() {
            let source = primary(chunk)?;
            let retrieve = Packet::Retrieve(Retrieve {
                chunk_id: chunk.chunk_id.clone(),
            });
            self.send(&retrieve, source).await?;
            debug!("Requested {} from {source}", chunk.chunk_id);

            let Data {
                chunk_id,
                next,
                corrupted,
                data,
            } = self
                .wait_for(&chunk.chunk_id, source, |packet| match packet {
                    Packet::Data(data) => Some(data),
                    _ => None,
                })
                .await?;
            if corrupted {
                warn!("Node {source} reported {chunk_id} as corrupted");
            }

            let decoded = self.codec.decode(&data)?;
            if decoded.corrupted {
                warn!("Corrected transmission errors in {chunk_id}");
            }
            file.write_all(&decoded.data).await?;
            written += decoded.data.len() as u64;

            on_event(TransferEvent::ChunkReceived {
                chunk_id,
                next,
                corrupted: corrupted || decoded.corrupted,
                len: decoded.data.len(),
            });
            on_event(TransferEvent::Progress {
                done: i as u64 + 1,
                total,
            });
        }

        file.flush().await?;
        info!("Download of {file_id} completed");
        on_event(TransferEvent::Completed {
            file_id: file_id.to_owned(),
            bytes: written,
        });
        Ok(written)
    }

    async fn send(&self, packet: &Packet, to: ChunkLocation) -> Result<(), TransferError> {
        let datagram = packet.encode()?;
        self.socket.send_to(&datagram, to).await?;
        Ok(())
    }

    /// Wait for the reply to `chunk_id` from `node` that `select` accepts,
    /// giving up after the configured ACK timeout.
    async fn wait_for<T, F>(
        &self,
        chunk_id: &ChunkId,
        node: ChunkLocation,
        select: F,
    ) -> Result<T, TransferError>
    where
        F: Fn(Packet) -> Option<T>,
    {
        let receive = self.receive_matching(chunk_id, node, select);
        match self.ack_timeout {
            Some(limit) => tokio::time::timeout(limit, receive)
                .await
                .map_err(|_| TransferError::Timeout {
                    chunk_id: chunk_id.clone(),
                    after: limit,
                })?,
            None => receive.await,
        }
    }

    /// Receive until a reply for `chunk_id` from `node` that `select`
    /// accepts arrives. Anything else is logged and ignored.
    async fn receive_matching<T, F>(
        &self,
        chunk_id: &ChunkId,
        node: ChunkLocation,
        select: F,
    ) -> Result<T, TransferError>
    where
        F: Fn(Packet) -> Option<T>,
    {
        let node = SocketAddr::V4(node);
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            if peer != node {
                warn!("Ignoring {len} bytes from {peer} while waiting for {chunk_id} from {node}");
                continue;
            }
            let packet = match Packet::decode(&buf[..len]) {
                Ok(packet) => packet,
                Err(err) => {
                    warn!("Ignoring malformed datagram from {peer}: {err}");
                    continue;
                }
            };

            if packet.chunk_id() != chunk_id {
                warn!(
                    "Ignoring {} for {} while waiting for {chunk_id}",
                    packet.name(),
                    packet.chunk_id()
                );
                continue;
            }
            let name = packet.name();
            match select(packet) {
                Some(reply) => return Ok(reply),
                None => warn!("Ignoring unexpected {name} for {chunk_id}"),
            }
        }
    }
}

fn primary(chunk: &ChunkInfo) -> Result<ChunkLocation, TransferError> {
    chunk.primary().ok_or_else(|| {
        TransferError::UnexpectedResponse(format!("no location for {}", chunk.chunk_id))
    })
}
