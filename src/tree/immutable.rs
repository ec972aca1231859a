use super::{lookup, subtree_height, subtree_size, verify};
use crate::{
    error::Result,
    hash::Hash,
    iterator::TreeIterator,
    node::NodeId,
    pool::NodeStore,
};

/// Read-only view of a committed version.
///
/// Nodes of committed versions are never mutated, so the view stays valid
/// while it is alive even though the tree keeps sharing them with newer
/// versions.
pub struct ImmutableTree<'a, S> {
    store: &'a S,
    root: Option<NodeId>,
    version: u64,
    hash: Hash,
}

impl<'a, S: NodeStore> ImmutableTree<'a, S> {
    pub(super) fn new(store: &'a S, root: Option<NodeId>, version: u64, hash: Hash) -> Self {
        Self {
            store,
            root,
            version,
            hash,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The hash recorded when the version was committed.
    pub fn root_hash(&self) -> Hash {
        self.hash
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn size(&self) -> Result<u64> {
        subtree_size(self.store, self.root)
    }

    pub fn height(&self) -> Result<u8> {
        subtree_height(self.store, self.root)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<&'a [u8]>> {
        lookup(self.store, self.root, key)
    }

    pub fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        inclusive: bool,
    ) -> TreeIterator<'a, S> {
        TreeIterator::new(self.store, self.root, start, end, inclusive, true)
    }

    pub fn reverse_iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> TreeIterator<'a, S> {
        TreeIterator::new(self.store, self.root, start, end, false, false)
    }

    pub fn verify(&self) -> Result<()> {
        verify::verify(self.store, self.root)
    }
}
