use std::{cmp::Ordering, fmt};

use crate::{
    error::InvariantError,
    hash::{Hash, TreeDigest},
};

/// Stable reference to a node held by a [`crate::pool::NodeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two shapes a node can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Holds a real key and its value.
    Leaf { value: Vec<u8> },

    /// Holds two children and the separator between them.
    ///
    /// Every key of `left` is strictly below `sort_key`, every key of `right`
    /// is at or above it.
    Branch {
        sort_key: Vec<u8>,
        left: NodeId,
        right: NodeId,
    },
}

/// A tree node.
///
/// For a leaf, `key` is the application key and doubles as the sort key. For a
/// branch, `key` is the smallest key of the right subtree: it is what point
/// lookups compare against, while the compressed `sort_key` orders the branch
/// among all other nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    key: Vec<u8>,
    kind: NodeKind,
    height: u8,
    size: u64,
    version: u64,
    hash: Option<Hash>,
}

impl Node {
    pub fn leaf(key: Vec<u8>, value: Vec<u8>, version: u64) -> Self {
        Self {
            key,
            kind: NodeKind::Leaf { value },
            height: 0,
            size: 1,
            version,
            hash: None,
        }
    }

    pub(crate) fn branch(
        key: Vec<u8>,
        sort_key: Vec<u8>,
        (left, right): (NodeId, NodeId),
        height: u8,
        size: u64,
        version: u64,
    ) -> Self {
        Self {
            key,
            kind: NodeKind::Branch {
                sort_key,
                left,
                right,
            },
            height,
            size,
            version,
            hash: None,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn sort_key(&self) -> &[u8] {
        match &self.kind {
            NodeKind::Leaf { .. } => &self.key,
            NodeKind::Branch { sort_key, .. } => sort_key,
        }
    }

    pub fn value(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::Leaf { value } => Some(value),
            NodeKind::Branch { .. } => None,
        }
    }

    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        match &self.kind {
            NodeKind::Leaf { .. } => None,
            NodeKind::Branch { left, right, .. } => Some((*left, *right)),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The cached digest, if it has been computed since the last change.
    pub fn hash(&self) -> Option<Hash> {
        self.hash
    }

    /// Copies this node into `version`, dropping the cached hash.
    pub(crate) fn fork(&self, version: u64) -> Self {
        Self {
            version,
            hash: None,
            ..self.clone()
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<(&mut NodeId, &mut NodeId)> {
        match &mut self.kind {
            NodeKind::Leaf { .. } => None,
            NodeKind::Branch { left, right, .. } => Some((left, right)),
        }
    }

    /// Replaces the value of a leaf. Branches are left untouched.
    pub fn set_value(&mut self, new_value: Vec<u8>) {
        if let NodeKind::Leaf { value } = &mut self.kind {
            *value = new_value;
        }
        self.hash = None;
    }

    /// Replaces the boundary and shape metadata of a branch.
    pub(crate) fn reshape(&mut self, key: Vec<u8>, new_sort_key: Vec<u8>, height: u8, size: u64) {
        if let NodeKind::Branch { sort_key, .. } = &mut self.kind {
            *sort_key = new_sort_key;
            self.key = key;
            self.height = height;
            self.size = size;
        }
        self.hash = None;
    }

    pub(crate) fn clear_hash(&mut self) {
        self.hash = None;
    }

    pub(crate) fn set_hash(&mut self, hash: Hash) {
        self.hash = Some(hash);
    }
}

/// Digest of a leaf: `H(height || size || len(key) || key || H(value))`.
///
/// The node version is not part of the preimage: rewriting a value with the
/// same bytes keeps the digest.
pub fn leaf_digest<D: TreeDigest>(key: &[u8], value: &[u8]) -> Hash {
    let mut hasher = D::new();
    hasher.update([0u8]);
    hasher.update(1u64.to_be_bytes());
    hasher.update((key.len() as u64).to_be_bytes());
    hasher.update(key);
    hasher.update(Hash::digest::<D>(value));
    Hash::finalize(hasher)
}

/// Digest of a branch: `H(height || size || left || right)`.
pub fn branch_digest<D: TreeDigest>(height: u8, size: u64, left: &Hash, right: &Hash) -> Hash {
    let mut hasher = D::new();
    hasher.update([height]);
    hasher.update(size.to_be_bytes());
    hasher.update(left);
    hasher.update(right);
    Hash::finalize(hasher)
}

/// Total order of nodes by `(sort_key, branch before leaf)`.
///
/// Sorting every node of a tree with this order reproduces its in-order
/// traversal. A branch can only tie with the smallest leaf of its own right
/// subtree, which follows it in-order. Two leaves or two branches sharing a
/// sort key cannot happen in a healthy tree.
pub fn sort_order(a: &Node, b: &Node) -> Result<Ordering, InvariantError> {
    match a.sort_key().cmp(b.sort_key()) {
        Ordering::Equal => match (a.is_leaf(), b.is_leaf()) {
            (false, true) => Ok(Ordering::Less),
            (true, false) => Ok(Ordering::Greater),
            (true, true) => Err(InvariantError::SortKeyCollision {
                sort_key: hex::encode(a.sort_key()),
                kind: "leaf",
            }),
            (false, false) => Err(InvariantError::SortKeyCollision {
                sort_key: hex::encode(a.sort_key()),
                kind: "branch",
            }),
        },
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sha2::Sha256;

    fn branch(sort_key: &[u8]) -> Node {
        Node::branch(
            sort_key.to_vec(),
            sort_key.to_vec(),
            (NodeId::new(0), NodeId::new(1)),
            1,
            2,
            1,
        )
    }

    #[test]
    fn test_leaf_sort_key_is_key() {
        let leaf = Node::leaf(b"apple".to_vec(), b"red".to_vec(), 3);

        assert!(leaf.is_leaf());
        assert_eq!(leaf.sort_key(), b"apple");
        assert_eq!(leaf.value(), Some(b"red".as_slice()));
        assert_eq!(leaf.height(), 0);
        assert_eq!(leaf.size(), 1);
        assert_eq!(leaf.children(), None);
    }

    #[test]
    fn test_branch_sort_key_is_separator() {
        let node = Node::branch(
            b"birdy".to_vec(),
            b"birdy".to_vec(),
            (NodeId::new(4), NodeId::new(7)),
            1,
            2,
            1,
        );

        assert!(!node.is_leaf());
        assert_eq!(node.value(), None);
        assert_eq!(node.children(), Some((NodeId::new(4), NodeId::new(7))));
    }

    #[test]
    fn test_fork_drops_hash() {
        let mut leaf = Node::leaf(b"k".to_vec(), b"v".to_vec(), 1);
        leaf.set_hash(Hash::zero());

        let copy = leaf.fork(2);

        assert_eq!(copy.version(), 2);
        assert_eq!(copy.hash(), None);
        assert_eq!(copy.key(), leaf.key());
    }

    #[test]
    fn test_set_value_clears_hash() {
        let mut leaf = Node::leaf(b"k".to_vec(), b"v".to_vec(), 1);
        leaf.set_hash(Hash::zero());
        leaf.set_value(b"w".to_vec());

        assert_eq!(leaf.hash(), None);
        assert_eq!(leaf.value(), Some(b"w".as_slice()));
    }

    #[test]
    fn test_branch_sorts_before_tied_leaf() {
        let leaf = Node::leaf(b"birdy".to_vec(), vec![], 1);
        let node = branch(b"birdy");

        assert_eq!(sort_order(&node, &leaf), Ok(Ordering::Less));
        assert_eq!(sort_order(&leaf, &node), Ok(Ordering::Greater));
    }

    #[test]
    fn test_colliding_sort_keys_are_rejected() {
        let a = Node::leaf(b"x".to_vec(), vec![], 1);
        let b = Node::leaf(b"x".to_vec(), vec![1], 2);
        assert!(matches!(
            sort_order(&a, &b),
            Err(InvariantError::SortKeyCollision { kind: "leaf", .. })
        ));

        assert!(matches!(
            sort_order(&branch(b"x"), &branch(b"x")),
            Err(InvariantError::SortKeyCollision { kind: "branch", .. })
        ));
    }

    #[test_strategy::proptest]
    fn test_leaf_digest_ignores_version(key: Vec<u8>, value: Vec<u8>) {
        let a = Node::leaf(key.clone(), value.clone(), 1);
        let b = a.fork(9);

        prop_assert_eq!(
            leaf_digest::<Sha256>(a.key(), a.value().unwrap_or_default()),
            leaf_digest::<Sha256>(b.key(), b.value().unwrap_or_default())
        );
    }

    #[test_strategy::proptest]
    fn test_leaf_digest_binds_key_and_value(key: Vec<u8>, value: Vec<u8>, other: Vec<u8>) {
        prop_assume!(value != other);

        prop_assert_ne!(
            leaf_digest::<Sha256>(&key, &value),
            leaf_digest::<Sha256>(&key, &other)
        );
    }

    #[test_strategy::proptest]
    fn test_branch_digest_is_ordered(left: Hash, right: Hash) {
        prop_assume!(left != right);

        prop_assert_ne!(
            branch_digest::<Sha256>(1, 2, &left, &right),
            branch_digest::<Sha256>(1, 2, &right, &left)
        );
    }
}
