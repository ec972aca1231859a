//! A versioned, Merkleized AVL tree.
//!
//! Keys live in the leaves. Every branch carries a compressed sort key, the
//! shortest byte string separating its two subtrees, which lets range scans
//! prune whole subtrees without reading full keys. Trees are copy-on-write per
//! version: committing freezes the current tree and hashes it, and older
//! versions stay readable while new ones are built.

mod error;

pub mod hash;
pub mod iterator;
pub mod node;
pub mod options;
pub mod pool;
pub mod prelude;
pub mod testing;
pub mod token;
pub mod tree;

pub use error::{Error, InvariantError, Result, StoreError};

#[doc(hidden)]
/// This is a hidden module to make the macros defined on this crate available for the users.
pub mod __dependencies {
    pub use paste;
    pub use proptest;
    pub use test_strategy;
}

/// Generates the contract tests every [`pool::NodeStore`] must pass.
///
/// The store type must implement [`Default`] and be in scope of the caller.
#[macro_export]
macro_rules! test_node_store {
    ($type:ident) => {
        $crate::__dependencies::paste::paste! {
            mod [<test_node_store_ $type:snake>] {
                use $crate::__dependencies::{
                    proptest::{collection::vec, prelude::*},
                    test_strategy,
                };
                use $crate::prelude::{Node, NodeStore};

                use super::$type;

                fn leaf(key: &[u8], value: &[u8]) -> Node {
                    Node::leaf(key.to_vec(), value.to_vec(), 1)
                }

                #[test_strategy::proptest(fork = false)]
                fn test_acquire_then_load(key: Vec<u8>, value: Vec<u8>) {
                    let mut store = <$type>::default();
                    let node = leaf(&key, &value);
                    let id = store.acquire(node.clone())?;

                    prop_assert_eq!(store.load(id)?, &node);
                }

                #[test_strategy::proptest(fork = false)]
                fn test_load_mut_is_visible(key: Vec<u8>, value: Vec<u8>) {
                    let mut store = <$type>::default();
                    let id = store.acquire(leaf(&key, b"before"))?;

                    store.load_mut(id)?.set_value(value.clone());

                    prop_assert_eq!(store.load(id)?.value(), Some(value.as_slice()));
                }

                #[test_strategy::proptest(fork = false)]
                fn test_release_returns_node(key: Vec<u8>, value: Vec<u8>) {
                    let mut store = <$type>::default();
                    let node = leaf(&key, &value);
                    let id = store.acquire(node.clone())?;

                    prop_assert_eq!(store.release(id)?, node);
                    prop_assert!(store.load(id).is_err());
                    prop_assert!(store.release(id).is_err());
                }

                #[test_strategy::proptest(fork = false)]
                fn test_live_references_are_distinct(
                    #[strategy(vec(any::<Vec<u8>>(), 1..32))] keys: Vec<Vec<u8>>,
                ) {
                    let mut store = <$type>::default();
                    let ids = keys
                        .iter()
                        .map(|key| store.acquire(leaf(key, key)))
                        .collect::<$crate::Result<Vec<_>>>()?;

                    for (key, id) in keys.iter().zip(&ids) {
                        prop_assert_eq!(store.load(*id)?.key(), key.as_slice());
                    }

                    let mut sorted = ids.clone();
                    sorted.sort();
                    sorted.dedup();
                    prop_assert_eq!(sorted.len(), ids.len());
                }
            }
        }
    };
}
