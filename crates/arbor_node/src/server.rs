//! UDP serving loop of a storage node.

use std::net::SocketAddr;

use arbor_storage::Storage;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use crate::node::StorageNode;
use crate::NodeError;

const RECV_BUFFER_SIZE: usize = 65536;

/// A [`StorageNode`] bound to a UDP socket.
pub struct NodeServer<S> {
    node: StorageNode<S>,
    socket: UdpSocket,
}

impl<S: Storage> NodeServer<S> {
    pub async fn bind(node: StorageNode<S>, addr: SocketAddr) -> Result<Self, NodeError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| NodeError::Bind { addr, source })?;

        Ok(Self { node, socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve datagrams one at a time until the task is dropped. Receive and
    /// send errors are logged and the loop carries on.
    pub async fn run(mut self) -> Result<(), NodeError> {
        let local = self.local_addr()?;
        info!("Node {} listening on udp://{local}", self.node.id());

        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    warn!("Node {} receive failed: {err}", self.node.id());
                    continue;
                }
            };
            debug!("Node {} received {len} bytes from {peer}", self.node.id());

            let Some(reply) = self.node.handle_datagram(&buf[..len]) else {
                continue;
            };

            let datagram = match reply.encode() {
                Ok(datagram) => datagram,
                Err(err) => {
                    error!("Node {} cannot encode {}: {err}", self.node.id(), reply.name());
                    continue;
                }
            };

            if let Err(err) = self.socket.send_to(&datagram, peer).await {
                warn!("Node {} failed to reply to {peer}: {err}", self.node.id());
            }
        }
    }
}
