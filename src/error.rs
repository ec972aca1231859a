use thiserror::Error as ThisError;

use crate::node::NodeId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Structural corruption detected while reading or reshaping the tree.
///
/// None of these are recoverable: the tree refuses to continue rather than
/// attempting a repair.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum InvariantError {
    #[error("duplicate leaf key {0}")]
    DuplicateLeaf(String),

    #[error("sort key {sort_key} shared by two {kind} nodes")]
    SortKeyCollision {
        sort_key: String,
        kind: &'static str,
    },

    #[error("keys out of order: {left} is not below {right}")]
    OutOfOrder { left: String, right: String },

    #[error("branch {0} is unbalanced (balance factor {1})")]
    Unbalanced(NodeId, i16),

    #[error("branch {0} records height {1}, children imply {2}")]
    InconsistentHeight(NodeId, u8, u8),

    #[error("branch {0} records size {1}, children imply {2}")]
    InconsistentSize(NodeId, u64, u64),

    #[error("branch {0} boundary key does not match its right subtree")]
    BoundaryMismatch(NodeId),

    #[error("expected node {0} to be a branch")]
    ExpectedBranch(NodeId),
}

/// Failures reported by a [`crate::pool::NodeStore`].
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum StoreError {
    #[error("node {0} does not exist")]
    Missing(NodeId),

    #[error("node {0} was already released")]
    Released(NodeId),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("node store has no addressable slot left")]
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantError),

    #[error("node store error: {0}")]
    Store(#[from] StoreError),

    #[error("version {0} does not exist")]
    VersionNotFound(u64),
}

impl InvariantError {
    pub(crate) fn out_of_order(left: &[u8], right: &[u8]) -> Self {
        Self::OutOfOrder {
            left: hex::encode(left),
            right: hex::encode(right),
        }
    }
}
