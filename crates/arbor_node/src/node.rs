//! Request handling of a storage node, independent of the socket it is
//! served on.

use std::collections::HashMap;
use std::net::SocketAddrV4;

use arbor_core::codec::IntegrityCodec;
use arbor_core::noise::NoiseInjector;
use arbor_core::topology::Cluster;
use arbor_core::{ChunkId, NodeId};
use arbor_protocol::wire::{Ack, Data, Retrieve, Store};
use arbor_protocol::Packet;
use arbor_storage::{Storage, StorageError};
use bytes::Bytes;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::NodeError;

/// Per-chunk metadata kept by the node that stores the chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub chunk_id: ChunkId,
    /// This node's successor in the ring at the time of the STORE.
    pub successor: SocketAddrV4,
    /// Whether the payload needed correction, or could not be recovered.
    pub corrupted: bool,
}

/// A storage node: a chunk store plus the metadata table describing it.
pub struct StorageNode<S> {
    id: NodeId,
    successor: SocketAddrV4,
    store: S,
    metadata: HashMap<ChunkId, ChunkMetadata>,
    codec: Box<dyn IntegrityCodec + Send + Sync>,
    noise: Option<NoiseInjector<StdRng>>,
}

impl<S: Storage> StorageNode<S> {
    pub fn new(
        id: NodeId,
        cluster: &Cluster,
        store: S,
        codec: Box<dyn IntegrityCodec + Send + Sync>,
    ) -> Result<Self, NodeError> {
        let successor = cluster
            .successor_address(id)
            .ok_or(NodeError::UnknownNode(id))?;
        debug!("Node {id} has ring successor {successor}");

        Ok(Self {
            id,
            successor,
            store,
            metadata: HashMap::new(),
            codec,
            noise: None,
        })
    }

    /// Corrupt incoming STORE payloads as if they crossed a noisy channel.
    pub fn with_noise(mut self, noise: NoiseInjector<StdRng>) -> Self {
        self.noise = Some(noise);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn successor(&self) -> SocketAddrV4 {
        self.successor
    }

    pub fn metadata(&self, chunk_id: &ChunkId) -> Option<&ChunkMetadata> {
        self.metadata.get(chunk_id)
    }

    /// Handle one datagram and return the reply to send, if any.
    ///
    /// Malformed datagrams, unknown chunks and storage failures produce no
    /// reply.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Option<Packet> {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("Node {} dropping malformed packet: {err}", self.id);
                return None;
            }
        };

        match packet {
            Packet::Store(store) => self.handle_store(store),
            Packet::Retrieve(retrieve) => self.handle_retrieve(retrieve),
            other => {
                warn!(
                    "Node {} dropping unexpected {} packet for {}",
                    self.id,
                    other.name(),
                    other.chunk_id()
                );
                None
            }
        }
    }

    fn handle_store(&mut self, store: Store) -> Option<Packet> {
        let Store {
            chunk_id,
            next: hint,
            data,
        } = store;

        if hint != self.successor {
            debug!(
                "Node {} ignoring next hop hint {hint} for {chunk_id}, successor is {}",
                self.id, self.successor
            );
        }

        let received = match self.noise.as_mut() {
            Some(noise) => Bytes::from(noise.inject(&data)),
            None => data,
        };

        let (payload, corrupted) = match self.codec.decode(&received) {
            Ok(decoded) => (decoded.data, decoded.corrupted),
            Err(err) => {
                warn!("Node {} could not recover {chunk_id}: {err}", self.id);
                (Vec::new(), true)
            }
        };

        if let Err(err) = self.store.write(&chunk_id, &payload) {
            error!("Node {} failed to store {chunk_id}: {err}", self.id);
            return None;
        }

        self.metadata.insert(
            chunk_id.clone(),
            ChunkMetadata {
                chunk_id: chunk_id.clone(),
                successor: self.successor,
                corrupted,
            },
        );

        info!(
            "Node {} stored {chunk_id} ({} bytes){}",
            self.id,
            payload.len(),
            if corrupted { " (corrupted)" } else { "" }
        );

        Some(Packet::Ack(Ack {
            chunk_id,
            next: self.successor,
            corrupted,
        }))
    }

    /// Serve a stored chunk. A payload found in the store without metadata
    /// was written before a restart; it is served as uncorrupted with this
    /// node's current successor.
    fn handle_retrieve(&self, retrieve: Retrieve) -> Option<Packet> {
        let chunk_id = retrieve.chunk_id;

        let payload = match self.store.read(&chunk_id) {
            Ok(payload) => payload,
            Err(StorageError::NotFound(_)) => {
                warn!("Node {} has no chunk {chunk_id}", self.id);
                return None;
            }
            Err(err) => {
                warn!("Node {} cannot read {chunk_id}: {err}", self.id);
                return None;
            }
        };

        let (successor, corrupted) = match self.metadata.get(&chunk_id) {
            Some(metadata) => (metadata.successor, metadata.corrupted),
            None => {
                debug!("Node {} serving {chunk_id} from storage without metadata", self.id);
                (self.successor, false)
            }
        };

        let encoded = self.codec.encode(&payload);
        info!(
            "Node {} served {chunk_id}{}",
            self.id,
            if corrupted { " (corrupted)" } else { "" }
        );

        Some(Packet::Data(Data {
            chunk_id,
            next: successor,
            corrupted,
            data: Bytes::from(encoded),
        }))
    }
}
