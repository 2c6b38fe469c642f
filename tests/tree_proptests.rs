//! Property-based tests for [`BPlusTree`].
//!
//! Every test checks the tree against a `BTreeMap` oracle and runs
//! [`BPlusTree::validate`] after mutations, so order, occupancy, height and
//! leaf chain invariants are exercised for every generated sequence.

mod common;

use std::collections::BTreeMap;
use std::ops::Bound;

use bplus_index::{BPlusTree, NodeRef, TreeError};
use proptest::prelude::*;

/// Operations for random testing.
#[derive(Debug, Clone)]
enum Op {
    Insert(u16, u8),
    Delete(u16, u8),
    Remove(u16),
}

fn degree() -> impl Strategy<Value = usize> {
    3usize..=9
}

/// Keys are drawn from a small domain so that inserts collide and deletes hit.
fn key() -> impl Strategy<Value = u16> {
    0u16..200
}

/// Values are drawn from a tiny domain so that some deletes name the right
/// key with the wrong value.
fn value() -> impl Strategy<Value = u8> {
    0u8..3
}

fn operations(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            4 => (key(), value()).prop_map(|(k, v)| Op::Insert(k, v)),
            2 => (key(), value()).prop_map(|(k, v)| Op::Delete(k, v)),
            1 => key().prop_map(Op::Remove),
        ],
        0..=max_ops,
    )
}

fn unique_keys(max_count: usize) -> impl Strategy<Value = Vec<u16>> {
    prop::collection::hash_set(any::<u16>(), 0..=max_count)
        .prop_map(|set| set.into_iter().collect())
}

/// Collects leaf keys in depth-first order.
fn inorder_keys<K: Clone, V>(node: NodeRef<'_, K, V>, out: &mut Vec<K>) {
    if node.is_leaf() {
        out.extend_from_slice(node.keys());
        return;
    }
    for i in 0..node.num_children() {
        if let Some(child) = node.child(i) {
            inorder_keys(child, out);
        }
    }
}

/// Collects leaf keys by following successor links from the leftmost leaf.
fn chain_keys<K: Clone, V>(tree: &BPlusTree<K, V>) -> Vec<K> {
    let mut node = tree.root();
    while let Some(child) = node.child(0) {
        node = child;
    }
    let mut keys = Vec::new();
    let mut leaf = Some(node);
    while let Some(l) = leaf {
        keys.extend_from_slice(l.keys());
        leaf = l.successor();
    }
    keys
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Random operations behave like a `BTreeMap` and keep the tree valid.
    #[test]
    fn operations_match_btreemap(degree in degree(), ops in operations(400)) {
        common::init_tracing();
        let mut tree = BPlusTree::new(degree).unwrap();
        let mut oracle = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let got = tree.insert(k, v);
                    if let std::collections::btree_map::Entry::Vacant(e) = oracle.entry(k) {
                        e.insert(v);
                        prop_assert_eq!(got, Ok(()));
                    } else {
                        prop_assert_eq!(got, Err(TreeError::AlreadyExists));
                    }
                }
                Op::Delete(k, v) => {
                    let got = tree.delete(&k, &v);
                    if oracle.get(&k) == Some(&v) {
                        oracle.remove(&k);
                        prop_assert_eq!(got, Ok(()));
                    } else {
                        prop_assert_eq!(got, Err(TreeError::KeyNotFound));
                    }
                }
                Op::Remove(k) => {
                    let got = tree.remove(&k);
                    prop_assert_eq!(got, oracle.remove(&k).ok_or(TreeError::KeyNotFound));
                }
            }
            prop_assert_eq!(tree.validate(), Ok(()));
        }

        prop_assert_eq!(tree.len(), oracle.len());
        prop_assert!(tree.iter().eq(oracle.iter()));
        for k in 0..200u16 {
            prop_assert_eq!(tree.get(&k), oracle.get(&k));
        }
    }

    /// The leaf chain visits the leaves in the same order as a depth-first
    /// traversal, and both yield strictly increasing keys.
    #[test]
    fn leaf_chain_matches_inorder(degree in degree(), keys in unique_keys(300)) {
        let mut tree = BPlusTree::new(degree).unwrap();
        for &k in &keys {
            tree.insert(k, ()).unwrap();
        }
        let mut inorder = Vec::new();
        inorder_keys(tree.root(), &mut inorder);
        let chained = chain_keys(&tree);
        prop_assert_eq!(&inorder, &chained);
        prop_assert!(chained.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(chained.len(), keys.len());
    }

    /// Inserting a set of keys and deleting them all, in any order, leaves an
    /// empty leaf as the root.
    #[test]
    fn insert_then_delete_all_leaves_empty_root(
        degree in degree(),
        (inserted, deleted) in unique_keys(300).prop_flat_map(|keys| {
            let shuffled = Just(keys.clone()).prop_shuffle();
            (Just(keys), shuffled)
        }),
    ) {
        let mut tree = BPlusTree::new(degree).unwrap();
        for &k in &inserted {
            tree.insert(k, u32::from(k)).unwrap();
        }
        for k in &deleted {
            prop_assert_eq!(tree.delete(k, &u32::from(*k)), Ok(()));
            prop_assert_eq!(tree.validate(), Ok(()));
        }
        let root = tree.root();
        prop_assert!(root.is_leaf());
        prop_assert_eq!(root.num_keys(), 0);
        prop_assert!(tree.is_empty());
    }

    /// A clone is unaffected by later mutations of the original and the other
    /// way round.
    #[test]
    fn clone_is_independent(
        degree in degree(),
        keys in unique_keys(200),
        ops in operations(100),
    ) {
        let mut tree = BPlusTree::new(degree).unwrap();
        for &k in &keys {
            tree.insert(k, 0u8).unwrap();
        }
        let snapshot: Vec<(u16, u8)> = tree.iter().map(|(k, v)| (*k, *v)).collect();
        let mut copy = tree.clone();
        prop_assert_eq!(copy.validate(), Ok(()));

        for op in &ops {
            let _ = match *op {
                Op::Insert(k, v) => tree.insert(k, v),
                Op::Delete(k, v) => tree.delete(&k, &v),
                Op::Remove(k) => tree.remove(&k).map(|_| ()),
            };
        }
        prop_assert!(copy.iter().map(|(k, v)| (*k, *v)).eq(snapshot.iter().copied()));
        prop_assert_eq!(copy.validate(), Ok(()));

        let after: Vec<(u16, u8)> = tree.iter().map(|(k, v)| (*k, *v)).collect();
        for &(k, v) in &snapshot {
            let _ = copy.delete(&k, &v);
        }
        prop_assert!(copy.is_empty());
        prop_assert!(tree.iter().map(|(k, v)| (*k, *v)).eq(after.into_iter()));
        prop_assert_eq!(tree.validate(), Ok(()));
    }

    /// Looking up the same key twice lands on the same leaf, and that leaf
    /// holds the key if and only if the tree does.
    #[test]
    fn find_is_idempotent(degree in degree(), keys in unique_keys(200), probe: u16) {
        let mut tree = BPlusTree::new(degree).unwrap();
        for &k in &keys {
            tree.insert(k, ()).unwrap();
        }
        let first = tree.find(&probe);
        prop_assert_eq!(first, tree.find(&probe));
        prop_assert!(first.is_leaf());
        prop_assert_eq!(first.keys().contains(&probe), keys.contains(&probe));
    }

    /// Range scans agree with `BTreeMap::range`.
    #[test]
    fn range_matches_btreemap(
        degree in degree(),
        keys in unique_keys(200),
        lo: u16,
        hi: u16,
        inclusive: bool,
    ) {
        let mut tree = BPlusTree::new(degree).unwrap();
        let mut oracle = BTreeMap::new();
        for &k in &keys {
            tree.insert(k, u32::from(k)).unwrap();
            oracle.insert(k, u32::from(k));
        }
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        let end = if inclusive { Bound::Included(hi) } else { Bound::Excluded(hi) };
        let bounds = (Bound::Included(lo), end);
        prop_assert!(tree.range(bounds).eq(oracle.range(bounds)));
        prop_assert!(tree.range(..hi).eq(oracle.range(..hi)));
        prop_assert!(tree.range((Bound::Excluded(lo), Bound::Unbounded))
            .eq(oracle.range((Bound::Excluded(lo), Bound::Unbounded))));
    }
}

#[test]
fn degree_three_scenario() {
    common::init_tracing();
    let mut tree = BPlusTree::new(3).unwrap();
    for k in 1..=5 {
        tree.insert(k, k).unwrap();
    }

    let root = tree.root();
    assert_eq!(root.keys(), &[3, 5]);
    let leaves: Vec<&[i32]> = (0..root.num_children())
        .map(|i| root.child(i).unwrap().keys())
        .collect();
    assert_eq!(leaves, vec![&[1, 2][..], &[3, 4][..], &[5][..]]);

    tree.delete(&3, &3).unwrap();
    assert_eq!(chain_keys(&tree), vec![1, 2, 4, 5]);
    tree.validate().unwrap();
}
