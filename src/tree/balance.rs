use std::cmp::Ordering;

use tracing::trace;

use super::{leftmost_key, rightmost_key, violation, Tree};
use crate::{
    error::{InvariantError, Result},
    hash::TreeDigest,
    node::NodeId,
    pool::NodeStore,
    token::min_right_token,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Side {
    Left,
    Right,
}

impl<S: NodeStore, D: TreeDigest> Tree<S, D> {
    /// Returns a working-version node standing in for `id`, copying it when it
    /// belongs to a committed version. Either way its cached hash is cleared.
    pub(super) fn mutable(&mut self, id: NodeId) -> Result<NodeId> {
        let working = self.working_version();
        let node = self.store.load(id)?;

        if node.version() < working {
            let copy = node.fork(working);
            return self.create(copy);
        }

        let original = node.clone();
        self.save(id, original);
        self.store.load_mut(id)?.clear_hash();
        Ok(id)
    }

    /// Drops `id` from the working tree. It is released once the mutation
    /// completes, unless a committed version can still reach it.
    pub(super) fn discard(&mut self, id: NodeId) -> Result<()> {
        if self.store.load(id)?.version() == self.working_version() {
            self.defer_release(id);
        }
        Ok(())
    }

    pub(super) fn children_of(&self, id: NodeId) -> Result<(NodeId, NodeId)> {
        self.store
            .load(id)?
            .children()
            .ok_or_else(|| violation(InvariantError::ExpectedBranch(id)))
    }

    pub(super) fn attach(&mut self, id: NodeId, side: Side, child: NodeId) -> Result<()> {
        let (left, right) = self
            .store
            .load_mut(id)?
            .children_mut()
            .ok_or_else(|| violation(InvariantError::ExpectedBranch(id)))?;

        match side {
            Side::Left => *left = child,
            Side::Right => *right = child,
        }
        Ok(())
    }

    /// Recomputes height, size, boundary key and sort key of a branch from its
    /// children.
    pub(super) fn reshape(&mut self, id: NodeId) -> Result<()> {
        let (left, right) = self.children_of(id)?;
        let (left_node, right_node) = (self.store.load(left)?, self.store.load(right)?);
        let height = 1 + left_node.height().max(right_node.height());
        let size = left_node.size() + right_node.size();

        let low = rightmost_key(&self.store, left)?;
        let high = leftmost_key(&self.store, right)?;

        match low.cmp(high) {
            Ordering::Less => {}
            Ordering::Equal => {
                return Err(violation(InvariantError::DuplicateLeaf(hex::encode(low))))
            }
            Ordering::Greater => return Err(violation(InvariantError::out_of_order(low, high))),
        }

        let sort_key = min_right_token(low, high);
        let key = high.to_vec();
        self.store.load_mut(id)?.reshape(key, sort_key, height, size);
        Ok(())
    }

    fn balance_factor(&self, id: NodeId) -> Result<i16> {
        let Some((left, right)) = self.store.load(id)?.children() else {
            return Ok(0);
        };

        let left = i16::from(self.store.load(left)?.height());
        let right = i16::from(self.store.load(right)?.height());
        Ok(left - right)
    }

    /// Restores the AVL balance of a freshly reshaped working node, returning
    /// the root of the rebalanced subtree.
    pub(super) fn balance(&mut self, id: NodeId) -> Result<NodeId> {
        let factor = self.balance_factor(id)?;

        if factor > 1 {
            let (left, _) = self.children_of(id)?;
            if self.balance_factor(left)? < 0 {
                let left = self.mutable(left)?;
                let left = self.rotate_left(left)?;
                self.attach(id, Side::Left, left)?;
            }
            return self.rotate_right(id);
        }

        if factor < -1 {
            let (_, right) = self.children_of(id)?;
            if self.balance_factor(right)? > 0 {
                let right = self.mutable(right)?;
                let right = self.rotate_right(right)?;
                self.attach(id, Side::Right, right)?;
            }
            return self.rotate_left(id);
        }

        Ok(id)
    }

    /// `id` must already belong to the working version.
    fn rotate_right(&mut self, id: NodeId) -> Result<NodeId> {
        let (left, _) = self.children_of(id)?;
        let pivot = self.mutable(left)?;
        let (_, moved) = self.children_of(pivot)?;

        self.attach(id, Side::Left, moved)?;
        self.reshape(id)?;
        self.attach(pivot, Side::Right, id)?;
        self.reshape(pivot)?;

        trace!(target: "iavl::tree", node = %id, %pivot, "rotated right");
        Ok(pivot)
    }

    /// `id` must already belong to the working version.
    fn rotate_left(&mut self, id: NodeId) -> Result<NodeId> {
        let (_, right) = self.children_of(id)?;
        let pivot = self.mutable(right)?;
        let (moved, _) = self.children_of(pivot)?;

        self.attach(id, Side::Right, moved)?;
        self.reshape(id)?;
        self.attach(pivot, Side::Left, id)?;
        self.reshape(pivot)?;

        trace!(target: "iavl::tree", node = %id, %pivot, "rotated left");
        Ok(pivot)
    }
}
