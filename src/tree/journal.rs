use tracing::{debug, error};

use super::Tree;
use crate::{
    error::Result,
    hash::TreeDigest,
    node::{Node, NodeId},
    pool::NodeStore,
};

/// Changes made to the store by the mutation in progress.
///
/// Working-version nodes are edited in place, so a mutation that fails
/// halfway would otherwise leave the tree partly rewritten.
#[derive(Debug, Default)]
pub(super) struct Journal {
    root: Option<NodeId>,
    /// Prior content of working nodes edited in place, oldest first.
    saved: Vec<(NodeId, Node)>,
    acquired: Vec<NodeId>,
    /// Working nodes unlinked from the tree, released once the mutation holds.
    discarded: Vec<NodeId>,
}

impl<S: NodeStore, D: TreeDigest> Tree<S, D> {
    /// Runs `mutation`, undoing every store change it made when it fails.
    pub(super) fn transact<T>(
        &mut self,
        mutation: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.journal = Journal {
            root: self.root,
            ..Journal::default()
        };

        match mutation(self) {
            Ok(outcome) => {
                self.settle()?;
                Ok(outcome)
            }
            Err(err) => {
                self.revert();
                Err(err)
            }
        }
    }

    /// Creates a node owned by the mutation in progress.
    pub(super) fn create(&mut self, node: Node) -> Result<NodeId> {
        let id = self.store.acquire(node)?;
        self.journal.acquired.push(id);
        Ok(id)
    }

    pub(super) fn save(&mut self, id: NodeId, node: Node) {
        self.journal.saved.push((id, node));
    }

    pub(super) fn defer_release(&mut self, id: NodeId) {
        self.journal.discarded.push(id);
    }

    fn settle(&mut self) -> Result<()> {
        let journal = std::mem::take(&mut self.journal);
        for id in journal.discarded {
            self.store.release(id)?;
        }
        Ok(())
    }

    fn revert(&mut self) {
        let journal = std::mem::take(&mut self.journal);
        let (saved, acquired) = (journal.saved.len(), journal.acquired.len());

        for (id, node) in journal.saved.into_iter().rev() {
            match self.store.load_mut(id) {
                Ok(slot) => *slot = node,
                Err(err) => error!(target: "iavl::tree", %id, %err, "cannot restore node"),
            }
        }
        for id in journal.acquired {
            if let Err(err) = self.store.release(id) {
                error!(target: "iavl::tree", %id, %err, "cannot release node");
            }
        }

        self.root = journal.root;
        debug!(target: "iavl::tree", saved, acquired, "reverted failed mutation");
    }
}
