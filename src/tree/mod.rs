//! The versioned AVL tree.
//!
//! All mutations apply to the *working version*. Nodes created since the last
//! commit belong to it and are edited in place; nodes of committed versions
//! are shared and copied before any change. [`Tree::save_version`] hashes the
//! working tree and freezes it, after which it stays readable through
//! [`Tree::get_immutable`] while the next working version builds on top of it.

mod balance;
mod immutable;
mod journal;
mod verify;

pub use immutable::ImmutableTree;

use std::{cmp::Ordering, collections::BTreeMap, marker::PhantomData};

use sha2::Sha256;
use tracing::{debug, error, info};

use crate::{
    error::{Error, InvariantError, Result},
    hash::{Hash, TreeDigest},
    iterator::TreeIterator,
    node::{branch_digest, leaf_digest, Node, NodeId, NodeKind},
    options::TreeOptions,
    pool::{NodePool, NodeStore},
    token::min_right_token,
};

use balance::Side;
use journal::Journal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Commit {
    root: Option<NodeId>,
    hash: Hash,
}

/// A Merkleized AVL tree over byte keys and values.
///
/// Leaves hold the key/value pairs; branches hold two children, the smallest
/// key of their right subtree (used by point lookups) and a compressed sort
/// key produced by [`min_right_token`] (used to order nodes and to prune range
/// scans).
pub struct Tree<S = NodePool, D = Sha256> {
    store: S,
    root: Option<NodeId>,
    /// Last committed version.
    version: u64,
    commits: BTreeMap<u64, Commit>,
    options: TreeOptions,
    journal: Journal,
    _digest: PhantomData<D>,
}

impl Tree {
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }

    pub fn with_options(options: TreeOptions) -> Self {
        Self::with_store(NodePool::with_capacity(options.pool_capacity), options)
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: NodeStore, D: TreeDigest> Tree<S, D> {
    pub fn with_store(store: S, options: TreeOptions) -> Self {
        Self {
            store,
            root: None,
            version: options.initial_version.saturating_sub(1),
            commits: BTreeMap::new(),
            options,
            journal: Journal::default(),
            _digest: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// The last committed version, or `initial_version - 1` before any commit.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The version new nodes are created in.
    pub fn working_version(&self) -> u64 {
        self.version + 1
    }

    pub fn available_versions(&self) -> impl Iterator<Item = u64> + '_ {
        self.commits.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of keys in the working tree.
    pub fn size(&self) -> Result<u64> {
        subtree_size(&self.store, self.root)
    }

    pub fn height(&self) -> Result<u8> {
        subtree_height(&self.store, self.root)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        lookup(&self.store, self.root, key)
    }

    /// Inserts or overwrites `key`, returning `true` when the key is new.
    ///
    /// On error the working tree is left as it was before the call.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        self.transact(|tree| {
            let (root, created) = match tree.root {
                Some(root) => tree.set_recursive(root, key, value)?,
                None => {
                    let leaf = Node::leaf(key.to_vec(), value.to_vec(), tree.working_version());
                    (tree.create(leaf)?, true)
                }
            };

            tree.root = Some(root);
            tree.audit()?;
            Ok(created)
        })
    }

    /// Removes `key`, returning its value when it was present.
    ///
    /// On error the working tree is left as it was before the call.
    pub fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.transact(|tree| {
            let Some(root) = tree.root else {
                return Ok(None);
            };
            let Some((root, value)) = tree.remove_recursive(root, key)? else {
                return Ok(None);
            };

            tree.root = root;
            tree.audit()?;
            Ok(Some(value))
        })
    }

    /// Digest of the working tree, computing every stale node hash on the way.
    pub fn root_hash(&mut self) -> Result<Hash> {
        match self.root {
            Some(root) => self.hash_node(root),
            None => Ok(Hash::digest::<D>(&[])),
        }
    }

    /// Commits the working tree and returns its hash and version number.
    pub fn save_version(&mut self) -> Result<(Hash, u64)> {
        let hash = self.root_hash()?;
        let version = self.working_version();

        self.commits.insert(
            version,
            Commit {
                root: self.root,
                hash,
            },
        );
        self.version = version;

        let size = self.size()?;
        info!(target: "iavl::tree", version, %hash, size, "committed version");
        Ok((hash, version))
    }

    /// Drops every uncommitted change and returns to the last committed root.
    pub fn rollback(&mut self) -> Result<()> {
        let working = self.working_version();
        let mut pending: Vec<NodeId> = self.root.into_iter().collect();
        let mut released = 0usize;

        // Older nodes never point at newer ones, so the walk stops at the
        // first node shared with a committed version.
        while let Some(id) = pending.pop() {
            let node = self.store.load(id)?;
            if node.version() != working {
                continue;
            }
            if let Some((left, right)) = node.children() {
                pending.extend([left, right]);
            }
            self.store.release(id)?;
            released += 1;
        }

        self.root = self.commits.get(&self.version).and_then(|commit| commit.root);
        debug!(target: "iavl::tree", version = self.version, released, "rolled back working version");
        Ok(())
    }

    /// Read-only view of a committed version.
    pub fn get_immutable(&self, version: u64) -> Result<ImmutableTree<'_, S>> {
        let commit = self
            .commits
            .get(&version)
            .ok_or(Error::VersionNotFound(version))?;

        Ok(ImmutableTree::new(
            &self.store,
            commit.root,
            version,
            commit.hash,
        ))
    }

    /// Ascending scan over `[start, end)`, or `[start, end]` when `inclusive`.
    pub fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        inclusive: bool,
    ) -> TreeIterator<'_, S> {
        TreeIterator::new(&self.store, self.root, start, end, inclusive, true)
    }

    /// Descending scan over `(end, start]`.
    pub fn reverse_iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> TreeIterator<'_, S> {
        TreeIterator::new(&self.store, self.root, start, end, false, false)
    }

    /// Audits the working tree: balance, shape metadata, boundary keys and the
    /// sort key order.
    pub fn verify(&self) -> Result<()> {
        verify::verify(&self.store, self.root)
    }

    fn audit(&self) -> Result<()> {
        if self.options.check_invariants {
            self.verify()?;
        }
        Ok(())
    }

    fn set_recursive(&mut self, id: NodeId, key: &[u8], value: &[u8]) -> Result<(NodeId, bool)> {
        let version = self.working_version();
        let node = self.store.load(id)?;

        let Some((left, right)) = node.children() else {
            return match key.cmp(node.key()) {
                Ordering::Equal => {
                    let id = self.mutable(id)?;
                    self.store.load_mut(id)?.set_value(value.to_vec());
                    Ok((id, false))
                }
                Ordering::Less => {
                    let boundary = node.key().to_vec();
                    let sort_key = min_right_token(key, &boundary);
                    let leaf = self.create(Node::leaf(key.to_vec(), value.to_vec(), version))?;
                    let branch = Node::branch(boundary, sort_key, (leaf, id), 1, 2, version);
                    Ok((self.create(branch)?, true))
                }
                Ordering::Greater => {
                    let sort_key = min_right_token(node.key(), key);
                    let leaf = self.create(Node::leaf(key.to_vec(), value.to_vec(), version))?;
                    let branch = Node::branch(key.to_vec(), sort_key, (id, leaf), 1, 2, version);
                    Ok((self.create(branch)?, true))
                }
            };
        };

        let (side, child) = if key < node.key() {
            (Side::Left, left)
        } else {
            (Side::Right, right)
        };

        let id = self.mutable(id)?;
        let (child, created) = self.set_recursive(child, key, value)?;
        self.attach(id, side, child)?;

        if !created {
            return Ok((id, false));
        }

        self.reshape(id)?;
        Ok((self.balance(id)?, true))
    }

    /// `None` when `key` is absent below `id`. Otherwise the subtree that
    /// replaces `id` (nothing when `id` was the removed leaf) and the value.
    #[allow(clippy::type_complexity)]
    fn remove_recursive(
        &mut self,
        id: NodeId,
        key: &[u8],
    ) -> Result<Option<(Option<NodeId>, Vec<u8>)>> {
        let node = self.store.load(id)?;

        let Some((left, right)) = node.children() else {
            if node.key() != key {
                return Ok(None);
            }
            let value = node.value().unwrap_or_default().to_vec();
            self.discard(id)?;
            return Ok(Some((None, value)));
        };

        let (side, child, sibling) = if key < node.key() {
            (Side::Left, left, right)
        } else {
            (Side::Right, right, left)
        };

        let Some((replacement, value)) = self.remove_recursive(child, key)? else {
            return Ok(None);
        };

        let Some(replacement) = replacement else {
            self.discard(id)?;
            return Ok(Some((Some(sibling), value)));
        };

        let id = self.mutable(id)?;
        self.attach(id, side, replacement)?;
        self.reshape(id)?;
        Ok(Some((Some(self.balance(id)?), value)))
    }

    fn hash_node(&mut self, id: NodeId) -> Result<Hash> {
        let node = self.store.load(id)?;
        if let Some(hash) = node.hash() {
            return Ok(hash);
        }

        let hash = match node.kind() {
            NodeKind::Leaf { value } => leaf_digest::<D>(node.key(), value),
            NodeKind::Branch { left, right, .. } => {
                let (left, right) = (*left, *right);
                let (height, size) = (node.height(), node.size());
                let left = self.hash_node(left)?;
                let right = self.hash_node(right)?;
                branch_digest::<D>(height, size, &left, &right)
            }
        };

        self.store.load_mut(id)?.set_hash(hash);
        Ok(hash)
    }
}

/// Logs a detected corruption and turns it into the error returned to the
/// caller.
pub(crate) fn violation(err: InvariantError) -> Error {
    error!(target: "iavl::tree", %err, "tree invariant violated");
    err.into()
}

pub(crate) fn lookup<'a, S: NodeStore>(
    store: &'a S,
    root: Option<NodeId>,
    key: &[u8],
) -> Result<Option<&'a [u8]>> {
    let Some(mut id) = root else {
        return Ok(None);
    };

    loop {
        let node = store.load(id)?;
        match node.kind() {
            NodeKind::Leaf { value } => return Ok((node.key() == key).then_some(value.as_slice())),
            NodeKind::Branch { left, right, .. } => {
                id = if key < node.key() { *left } else { *right };
            }
        }
    }
}

pub(crate) fn subtree_size<S: NodeStore>(store: &S, root: Option<NodeId>) -> Result<u64> {
    root.map_or(Ok(0), |id| Ok(store.load(id)?.size()))
}

pub(crate) fn subtree_height<S: NodeStore>(store: &S, root: Option<NodeId>) -> Result<u8> {
    root.map_or(Ok(0), |id| Ok(store.load(id)?.height()))
}

pub(crate) fn leftmost_key<S: NodeStore>(store: &S, mut id: NodeId) -> Result<&[u8]> {
    loop {
        let node = store.load(id)?;
        match node.children() {
            Some((left, _)) => id = left,
            None => return Ok(node.key()),
        }
    }
}

pub(crate) fn rightmost_key<S: NodeStore>(store: &S, mut id: NodeId) -> Result<&[u8]> {
    loop {
        let node = store.load(id)?;
        match node.children() {
            Some((_, right)) => id = right,
            None => return Ok(node.key()),
        }
    }
}
