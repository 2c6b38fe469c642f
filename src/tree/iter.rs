//! In-order iterators over a [`super::BPlusTree`].
//!
//! Both iterators walk the leaf chain through successor links, so internal
//! nodes are only visited once, to locate the starting leaf.

use std::iter::FusedIterator;
use std::ops::Bound;

use super::node_store::{NodeId, NodeStore};

/// A position within the leaf chain.
struct Cursor<'t, K, V> {
    store: &'t NodeStore<K, V>,
    leaf: Option<NodeId>,
    i: usize,
}

impl<'t, K, V> Cursor<'t, K, V> {
    fn next(&mut self) -> Option<(&'t K, &'t V)> {
        let store = self.store;
        while let Some(id) = self.leaf {
            let leaf = store.leaf(id);
            if self.i < leaf.num_keys() {
                let i = self.i;
                self.i += 1;
                return leaf.value(i).map(|val| (leaf.key(i), val));
            }
            self.leaf = leaf.successor();
            self.i = 0;
        }
        None
    }
}

/// An iterator over every key-value pair of a tree, in key order.
pub struct Iter<'t, K, V> {
    cursor: Cursor<'t, K, V>,
    remaining: usize,
}

impl<'t, K, V> Iter<'t, K, V> {
    pub(super) fn new(store: &'t NodeStore<K, V>, first_leaf: NodeId, len: usize) -> Self {
        Iter {
            cursor: Cursor {
                store,
                leaf: Some(first_leaf),
                i: 0,
            },
            remaining: len,
        }
    }
}

impl<'t, K, V> Iterator for Iter<'t, K, V> {
    type Item = (&'t K, &'t V);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.cursor.next()?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// An iterator over the key-value pairs of a tree within a key range, in
/// key order.
pub struct Range<'t, K, V> {
    cursor: Cursor<'t, K, V>,
    end_bound: Bound<K>,
}

impl<'t, K, V> Range<'t, K, V> {
    pub(super) fn new(
        store: &'t NodeStore<K, V>,
        start_leaf: NodeId,
        start: usize,
        end_bound: Bound<K>,
    ) -> Self {
        Range {
            cursor: Cursor {
                store,
                leaf: Some(start_leaf),
                i: start,
            },
            end_bound,
        }
    }
}

impl<'t, K: Ord, V> Iterator for Range<'t, K, V> {
    type Item = (&'t K, &'t V);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, val) = self.cursor.next()?;
        let in_range = match &self.end_bound {
            Bound::Included(end) => key <= end,
            Bound::Excluded(end) => key < end,
            Bound::Unbounded => true,
        };
        if in_range {
            Some((key, val))
        } else {
            self.cursor.leaf = None;
            None
        }
    }
}

impl<K: Ord, V> FusedIterator for Range<'_, K, V> {}
