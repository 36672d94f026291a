//! The static node tree and the depth-first ring derived from it.
//!
//! Nodes form a complete binary tree rooted at node 0 where node `i` has
//! children `2i + 1` and `2i + 2` (when they exist). A post-order walk of the
//! tree yields the [`DfsOrder`], a fixed cyclic sequence of all nodes that
//! is used as the placement rotation and to find each node's successor.

use std::net::{Ipv4Addr, SocketAddrV4};

use thiserror::Error;

use crate::node::NodeId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("A cluster needs at least one node")]
    Empty,

    #[error("Node directory lists {listed} addresses but the cluster has {expected} nodes")]
    DirectorySizeMismatch { listed: usize, expected: usize },

    #[error("Base port {base_port} leaves no room for {num_nodes} nodes")]
    PortRangeOverflow { base_port: u16, num_nodes: u16 },
}

/// Complete binary tree over `N` nodes, stored as an arena of child lists
/// indexed by node id.
#[derive(Clone, Debug)]
pub struct Topology {
    children: Vec<Vec<NodeId>>,
}

impl Topology {
    pub fn new(num_nodes: u16) -> Result<Self, TopologyError> {
        if num_nodes == 0 {
            return Err(TopologyError::Empty);
        }

        let n = num_nodes as usize;
        let children = (0..n)
            .map(|i| {
                [2 * i + 1, 2 * i + 2]
                    .into_iter()
                    .filter(|&c| c < n)
                    .map(|c| NodeId(c as u16))
                    .collect()
            })
            .collect();

        Ok(Topology { children })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Children of `id` in left-then-right order. Empty for leaves and for
    /// ids outside the tree.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Post-order traversal from the root: every child subtree, left first,
    /// is emitted before its parent.
    pub fn dfs_order(&self) -> DfsOrder {
        let mut order = Vec::with_capacity(self.len());
        // (node, children already pushed)
        let mut stack = vec![(self.root(), false)];

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            stack.push((node, true));
            for &child in self.children(node).iter().rev() {
                stack.push((child, false));
            }
        }

        DfsOrder::from_order(order)
    }
}

/// The post-order ring of node ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DfsOrder {
    order: Vec<NodeId>,
    /// `positions[id]` is the index of `id` in `order`.
    positions: Vec<usize>,
}

impl DfsOrder {
    fn from_order(order: Vec<NodeId>) -> Self {
        let mut positions = vec![0; order.len()];
        for (pos, id) in order.iter().enumerate() {
            positions[id.index()] = pos;
        }
        DfsOrder { order, positions }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[NodeId] {
        &self.order
    }

    /// Node at ring position `pos`, wrapping around the ring.
    pub fn at(&self, pos: usize) -> NodeId {
        self.order[pos % self.order.len()]
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.positions.get(id.index()).copied()
    }

    /// Next node after `id` in the ring; the last node wraps to the first.
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        self.position(id).map(|pos| self.at(pos + 1))
    }
}

/// Where each node listens for data packets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeDirectory {
    /// Every node on one host, node `i` on `base_port + i`.
    Contiguous { ip: Ipv4Addr, base_port: u16 },
    /// One address per node id, in id order.
    Explicit(Vec<SocketAddrV4>),
}

impl NodeDirectory {
    fn resolve(&self, num_nodes: u16) -> Result<Vec<SocketAddrV4>, TopologyError> {
        match self {
            NodeDirectory::Contiguous { ip, base_port } => (0..num_nodes)
                .map(|id| {
                    base_port
                        .checked_add(id)
                        .map(|port| SocketAddrV4::new(*ip, port))
                        .ok_or(TopologyError::PortRangeOverflow {
                            base_port: *base_port,
                            num_nodes,
                        })
                })
                .collect(),
            NodeDirectory::Explicit(addrs) => {
                if addrs.len() != num_nodes as usize {
                    return Err(TopologyError::DirectorySizeMismatch {
                        listed: addrs.len(),
                        expected: num_nodes as usize,
                    });
                }
                Ok(addrs.clone())
            }
        }
    }
}

/// Everything a component needs to know about the fixed cluster: the tree,
/// its ring and the address of every node.
#[derive(Clone, Debug)]
pub struct Cluster {
    topology: Topology,
    order: DfsOrder,
    addresses: Vec<SocketAddrV4>,
}

impl Cluster {
    pub fn new(num_nodes: u16, directory: &NodeDirectory) -> Result<Self, TopologyError> {
        let topology = Topology::new(num_nodes)?;
        let order = topology.dfs_order();
        let addresses = directory.resolve(num_nodes)?;

        Ok(Cluster {
            topology,
            order,
            addresses,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.addresses.len()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn dfs_order(&self) -> &DfsOrder {
        &self.order
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.addresses.len()
    }

    pub fn address(&self, id: NodeId) -> Option<SocketAddrV4> {
        self.addresses.get(id.index()).copied()
    }

    /// Address of the ring successor of `id`.
    pub fn successor_address(&self, id: NodeId) -> Option<SocketAddrV4> {
        self.order
            .successor(id)
            .and_then(|next| self.address(next))
    }
}
