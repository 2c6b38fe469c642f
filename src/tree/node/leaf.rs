//! A [`Leaf`] node holds a sub-range of key-value pairs of the B+ tree.
//! All key-values of the tree are stored in one or more leaf nodes, and the
//! leaves are chained left to right through their successor links.
//!
//! The tree is initialized as an empty leaf node.

use crate::consts;
use crate::tree::node_store::NodeId;

use super::Slots;

/// A B+ tree leaf node.
#[derive(Debug)]
pub(crate) struct Leaf<K, V> {
    slots: Slots<K, V>,
    successor: Option<NodeId>,
}

impl<K, V> Leaf<K, V> {
    /// Creates an empty leaf for a tree of the given degree.
    pub fn new(degree: usize) -> Self {
        Leaf {
            slots: Slots::new(consts::max_keys(degree)),
            successor: None,
        }
    }

    /// Gets the `i`th key.
    #[inline]
    pub fn key(&self, i: usize) -> &K {
        self.slots.key(i)
    }

    /// Gets the `i`th value.
    #[inline]
    pub fn value(&self, i: usize) -> Option<&V> {
        self.slots.pointers().get(i)
    }

    #[inline]
    pub fn first_key(&self) -> Option<&K> {
        self.slots.first_key()
    }

    #[inline]
    pub fn keys(&self) -> &[K] {
        self.slots.keys()
    }

    /// Gets the number of keys in the leaf.
    #[inline]
    pub fn num_keys(&self) -> usize {
        self.slots.num_keys()
    }

    #[inline]
    pub fn has_room(&self) -> bool {
        self.slots.has_room()
    }

    /// Gets the next leaf in key order.
    #[inline]
    pub fn successor(&self) -> Option<NodeId> {
        self.successor
    }

    /// Replaces the successor link and returns the previous one.
    pub fn set_successor(&mut self, successor: Option<NodeId>) -> Option<NodeId> {
        std::mem::replace(&mut self.successor, successor)
    }

    /// Removes the `i`th key-value pair.
    pub fn remove_at(&mut self, i: usize) -> (K, V) {
        self.slots.remove_at(i)
    }

    /// Moves all pairs of `right` to the end of this leaf and takes over its
    /// successor link. `right` is left empty.
    pub fn merge_from(&mut self, right: &mut Leaf<K, V>) {
        assert!(
            self.num_keys() + right.num_keys() <= self.slots.capacity(),
            "merged leaf would overflow"
        );
        self.slots.append(&mut right.slots);
        self.successor = right.successor.take();
        right.slots.clear();
    }

    /// Removes the last pair.
    pub fn pop_last(&mut self) -> (K, V) {
        assert!(self.num_keys() > 0, "pop from an empty leaf");
        self.slots.remove_at(self.num_keys() - 1)
    }

    /// Removes the first pair.
    pub fn pop_first(&mut self) -> (K, V) {
        assert!(self.num_keys() > 0, "pop from an empty leaf");
        self.slots.remove_at(0)
    }

    pub fn push_front(&mut self, key: K, val: V) {
        self.slots.insert_at(key, val, 0);
    }

    pub fn push_back(&mut self, key: K, val: V) {
        let n = self.num_keys();
        self.slots.insert_at(key, val, n);
    }
}

impl<K: Ord, V> Leaf<K, V> {
    /// Gets the value corresponding to the queried key.
    pub fn get(&self, key: &K) -> Option<&V> {
        let i = self.slots.find_index_ge(key)?;
        (self.slots.key(i) == key).then(|| &self.slots.pointers()[i])
    }

    /// Inserts a key-value pair after any pair with an equal key.
    /// The leaf must have room.
    pub fn insert(&mut self, key: K, val: V) {
        let pos = self.slots.keys().partition_point(|k| k <= &key);
        self.slots.insert_at(key, val, pos);
    }

    /// Inserts a key-value pair into a full leaf and splits it.
    ///
    /// The `d − 1` existing pairs plus the new one are placed in a scratch
    /// leaf of capacity `d`. This leaf keeps the pairs at `[0, m)` and the
    /// returned leaf receives `[m, d)`, where `m = ⌈d/2⌉`. Neither leaf is
    /// linked into the chain yet.
    pub fn split_insert(&mut self, key: K, val: V, degree: usize) -> Leaf<K, V> {
        let capacity = self.slots.capacity();
        let scratch = std::mem::replace(&mut self.slots, Slots::new(capacity));
        let mut scratch = Leaf {
            slots: scratch.resized(capacity + 1),
            successor: None,
        };
        scratch.insert(key, val);
        let right = scratch.slots.split_off(consts::split_point(degree));
        self.slots = scratch.slots.resized(capacity);
        Leaf {
            slots: right.resized(capacity),
            successor: None,
        }
    }
}

impl<K: Ord, V: PartialEq> Leaf<K, V> {
    /// Finds the index of the pair equal to both `key` and `val`.
    pub fn position(&self, key: &K, val: &V) -> Option<usize> {
        let start = self.slots.find_index_l(key).map_or(0, |i| i + 1);
        (start..self.num_keys())
            .take_while(|&i| self.slots.key(i) == key)
            .find(|&i| &self.slots.pointers()[i] == val)
    }
}

impl<K: Clone, V: Clone> Leaf<K, V> {
    /// Creates a copy of this leaf's pairs. The copy has no successor.
    pub fn copy_of(leaf: &Leaf<K, V>) -> Self {
        let mut slots = Slots::new(leaf.slots.capacity());
        slots.copy_range(&leaf.slots, 0, leaf.num_keys());
        Leaf {
            slots,
            successor: None,
        }
    }
}
