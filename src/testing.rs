//! Strategies and fixtures shared by the property tests.

use std::cell::Cell;

use proptest::{
    collection::vec,
    prelude::*,
    sample::SizeRange,
    strategy::ValueTree,
    test_runner::TestRunner,
};

use crate::{
    error::{Result, StoreError},
    hash::{Hash, TreeDigest},
    node::{Node, NodeId},
    pool::{NodePool, NodeStore},
    tree::Tree,
};

/// A single mutation applied to a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Set(Vec<u8>, Vec<u8>),
    Remove(Vec<u8>),
}

impl Arbitrary for Op {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            3 => (keys(), values()).prop_map(|(key, value)| Op::Set(key, value)),
            1 => keys().prop_map(Op::Remove),
        ]
        .boxed()
    }
}

impl Op {
    pub fn key(&self) -> &[u8] {
        match self {
            Op::Set(key, _) | Op::Remove(key) => key,
        }
    }

    pub fn apply<S: NodeStore, D: TreeDigest>(&self, tree: &mut Tree<S, D>) -> Result<()> {
        match self {
            Op::Set(key, value) => tree.set(key, value).map(drop),
            Op::Remove(key) => tree.remove(key).map(drop),
        }
    }
}

/// Keys over a four-letter alphabet, so generated keys often share prefixes
/// and collide with each other.
pub fn keys() -> impl Strategy<Value = Vec<u8>> {
    vec(b'a'..b'e', 0..6)
}

pub fn values() -> impl Strategy<Value = Vec<u8>> {
    vec(any::<u8>(), 0..8)
}

pub fn ops(size: impl Into<SizeRange>) -> impl Strategy<Value = Vec<Op>> {
    vec(any::<Op>(), size)
}

/// Batches of operations, each batch meant to be committed as one version.
pub fn changesets(
    versions: impl Into<SizeRange>,
    size: impl Into<SizeRange>,
) -> impl Strategy<Value = Vec<Vec<Op>>> {
    vec(ops(size), versions)
}

/// Applies every changeset and commits after each one, returning the
/// committed hashes in order.
pub fn build<S: NodeStore, D: TreeDigest>(
    tree: &mut Tree<S, D>,
    changesets: &[Vec<Op>],
) -> Result<Vec<(Hash, u64)>> {
    changesets
        .iter()
        .map(|changeset| {
            for op in changeset {
                op.apply(tree)?;
            }
            tree.save_version()
        })
        .collect()
}

/// Keys `a` to `g` with values `1` to `7`.
pub fn letters() -> Vec<(Vec<u8>, Vec<u8>)> {
    (b'a'..=b'g')
        .zip(b'1'..=b'7')
        .map(|(key, value)| (vec![key], vec![value]))
        .collect()
}

/// Draws one value from `strategy` with a deterministic runner, for fixtures
/// larger than a property test should shrink.
pub fn sample<T: std::fmt::Debug>(strategy: impl Strategy<Value = T>) -> Option<T> {
    let mut runner = TestRunner::deterministic();
    strategy.new_tree(&mut runner).ok().map(|tree| tree.current())
}

/// [`NodePool`] that counts loads and can be told to fail reading one node.
#[derive(Debug, Default)]
pub struct InstrumentedStore {
    pool: NodePool,
    broken: Cell<Option<NodeId>>,
    loads: Cell<usize>,
}

impl InstrumentedStore {
    /// Makes every later `load` of `id` fail with [`StoreError::Unavailable`].
    pub fn break_node(&self, id: NodeId) {
        self.broken.set(Some(id));
    }

    pub fn repair(&self) {
        self.broken.set(None);
    }

    /// Loads served since the last [`InstrumentedStore::reset_loads`].
    pub fn loads(&self) -> usize {
        self.loads.get()
    }

    pub fn reset_loads(&self) {
        self.loads.set(0);
    }

    pub fn pool(&self) -> &NodePool {
        &self.pool
    }
}

impl NodeStore for InstrumentedStore {
    fn acquire(&mut self, node: Node) -> Result<NodeId> {
        self.pool.acquire(node)
    }

    fn release(&mut self, id: NodeId) -> Result<Node> {
        self.pool.release(id)
    }

    fn load(&self, id: NodeId) -> Result<&Node> {
        if self.broken.get() == Some(id) {
            return Err(StoreError::Unavailable(format!("cannot read {id}")).into());
        }
        self.loads.set(self.loads.get() + 1);
        self.pool.load(id)
    }

    fn load_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.pool.load_mut(id)
    }
}

/// Installs a `tracing` subscriber honouring `RUST_LOG` for the running test.
#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
