pub use crate::{
    error::*,
    hash::{Hash, TreeDigest},
    iterator::{IteratorState, TreeIterator},
    node::{Node, NodeId, NodeKind},
    options::TreeOptions,
    pool::{NodePool, NodeStore, PoolStats},
    token::min_right_token,
    tree::{ImmutableTree, Tree},
};
