use tracing::trace;

use crate::{
    error::{Result, StoreError},
    node::{Node, NodeId},
};

/// Where the tree keeps its nodes.
///
/// The tree never holds nodes directly: it creates them with
/// [`NodeStore::acquire`], reads them with [`NodeStore::load`], and hands back
/// the ones no version references any more with [`NodeStore::release`].
/// Implementations backed by durable storage report I/O failures through
/// [`StoreError`]; the tree propagates them untouched.
pub trait NodeStore {
    /// Stores a fresh node and returns its reference.
    fn acquire(&mut self, node: Node) -> Result<NodeId>;

    /// Gives a node back. The reference must not be used afterwards.
    fn release(&mut self, id: NodeId) -> Result<Node>;

    fn load(&self, id: NodeId) -> Result<&Node>;

    fn load_mut(&mut self, id: NodeId) -> Result<&mut Node>;
}

/// Allocation counters of a [`NodePool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
    /// Acquisitions served from a previously released slot.
    pub reused: u64,
}

/// In-memory arena of nodes.
///
/// Released slots are kept on a free list and handed out again by later
/// acquisitions, so a long-running tree does not grow its arena for every
/// short-lived node.
#[derive(Debug, Default)]
pub struct NodePool {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
    stats: PoolStats,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl NodeStore for NodePool {
    fn acquire(&mut self, node: Node) -> Result<NodeId> {
        if let Some(id) = self.free.pop() {
            self.stats.acquired += 1;
            self.stats.reused += 1;
            trace!(target: "iavl::pool", %id, "reusing released slot");
            self.slots[id.index()] = Some(node);
            return Ok(id);
        }

        let id = next_id(self.slots.len())?;
        self.stats.acquired += 1;
        self.slots.push(Some(node));
        Ok(id)
    }

    fn release(&mut self, id: NodeId) -> Result<Node> {
        let node = self
            .slots
            .get_mut(id.index())
            .ok_or(StoreError::Missing(id))?
            .take()
            .ok_or(StoreError::Released(id))?;

        self.stats.released += 1;
        self.free.push(id);
        Ok(node)
    }

    fn load(&self, id: NodeId) -> Result<&Node> {
        match self.slots.get(id.index()) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(StoreError::Released(id).into()),
            None => Err(StoreError::Missing(id).into()),
        }
    }

    fn load_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        match self.slots.get_mut(id.index()) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(StoreError::Released(id).into()),
            None => Err(StoreError::Missing(id).into()),
        }
    }
}

/// Reference of the slot appended after `len` existing ones.
fn next_id(len: usize) -> Result<NodeId> {
    u32::try_from(len)
        .map(NodeId::new)
        .map_err(|_| StoreError::Exhausted.into())
}
