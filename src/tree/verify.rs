use std::cmp::Ordering;

use super::{leftmost_key, violation};
use crate::{
    error::{InvariantError, Result},
    node::{sort_order, Node, NodeId},
    pool::NodeStore,
};

/// Full audit of the subtree under `root`.
///
/// Sorting all nodes with [`sort_order`] must reproduce the in-order walk, which
/// covers key order and the placement of every branch sort key. Every branch
/// is also checked for balance, consistent height and size, and a boundary key
/// equal to the smallest key of its right subtree.
pub(crate) fn verify<S: NodeStore>(store: &S, root: Option<NodeId>) -> Result<()> {
    let Some(root) = root else {
        return Ok(());
    };

    let nodes = in_order(store, root)?;

    for pair in nodes.windows(2) {
        let ((_, a), (_, b)) = (pair[0], pair[1]);
        match sort_order(a, b).map_err(violation)? {
            Ordering::Less => {}
            _ => {
                return Err(violation(InvariantError::out_of_order(
                    a.sort_key(),
                    b.sort_key(),
                )))
            }
        }
    }

    for (id, node) in nodes {
        let Some((left, right)) = node.children() else {
            continue;
        };
        let (left_node, right_node) = (store.load(left)?, store.load(right)?);

        let factor = i16::from(left_node.height()) - i16::from(right_node.height());
        if factor.abs() > 1 {
            return Err(violation(InvariantError::Unbalanced(id, factor)));
        }

        let height = 1 + left_node.height().max(right_node.height());
        if node.height() != height {
            return Err(violation(InvariantError::InconsistentHeight(
                id,
                node.height(),
                height,
            )));
        }

        let size = left_node.size() + right_node.size();
        if node.size() != size {
            return Err(violation(InvariantError::InconsistentSize(
                id,
                node.size(),
                size,
            )));
        }

        if node.key() != leftmost_key(store, right)? {
            return Err(violation(InvariantError::BoundaryMismatch(id)));
        }
    }

    Ok(())
}

/// Every node under `root`, branches included, in in-order position.
pub(crate) fn in_order<S: NodeStore>(store: &S, root: NodeId) -> Result<Vec<(NodeId, &Node)>> {
    let mut nodes = Vec::new();
    let mut stack = Vec::new();
    let mut next = Some(root);

    loop {
        while let Some(id) = next {
            let node = store.load(id)?;
            stack.push((id, node));
            next = node.children().map(|(left, _)| left);
        }

        let Some((id, node)) = stack.pop() else {
            break;
        };
        nodes.push((id, node));
        next = node.children().map(|(_, right)| right);
    }

    Ok(nodes)
}
