//! An [`Internal`] node routes lookups to its children using separator keys.
//!
//! For `n` keys there are `n + 1` children. `child(i)` holds every key that
//! is strictly less than `key(i)`, and `child(i + 1)` holds every key that is
//! greater than or equal to it.

use crate::consts;
use crate::tree::node_store::NodeId;

use super::Slots;

/// A B+ tree internal node.
#[derive(Debug)]
pub(crate) struct Internal<K> {
    // pointers.len() == keys.len() + 1 once the node has children.
    slots: Slots<K, NodeId>,
}

impl<K> Internal<K> {
    /// Creates an empty internal node for a tree of the given degree.
    pub fn new(degree: usize) -> Self {
        Internal {
            slots: Slots::new(consts::max_keys(degree)),
        }
    }

    /// Creates a new root whose children are the two halves of a split.
    pub fn parent_of_split(left: NodeId, key: K, right: NodeId, degree: usize) -> Self {
        let mut root = Internal::new(degree);
        root.slots.insert_at(key, left, 0);
        root.slots.pointers.push(right);
        root
    }

    /// Gets the `i`th key.
    #[inline]
    pub fn key(&self, i: usize) -> &K {
        self.slots.key(i)
    }

    #[inline]
    pub fn first_key(&self) -> Option<&K> {
        self.slots.first_key()
    }

    #[inline]
    pub fn keys(&self) -> &[K] {
        self.slots.keys()
    }

    #[inline]
    pub fn num_keys(&self) -> usize {
        self.slots.num_keys()
    }

    #[inline]
    pub fn num_children(&self) -> usize {
        self.slots.pointers().len()
    }

    #[inline]
    pub fn has_room(&self) -> bool {
        self.slots.has_room()
    }

    /// Gets the `i`th child, or `None` past the populated range.
    #[inline]
    pub fn child(&self, i: usize) -> Option<NodeId> {
        self.slots.pointers().get(i).copied()
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        self.slots.pointers()
    }

    /// Replaces the `i`th child.
    pub fn set_child(&mut self, i: usize, child: NodeId) {
        self.slots.pointers[i] = child;
    }

    /// Replaces the `i`th separator key and returns the old one.
    pub fn set_key(&mut self, i: usize, key: K) -> K {
        std::mem::replace(&mut self.slots.keys[i], key)
    }

    /// Finds the index of `child` among the children.
    pub fn position_of(&self, child: NodeId) -> Option<usize> {
        self.slots.pointers().iter().position(|&c| c == child)
    }

    /// Inserts `key` and `child` immediately after `after`.
    /// The node must have room and `after` must be one of its children.
    pub fn insert_after(&mut self, key: K, child: NodeId, after: NodeId) {
        assert!(self.has_room(), "insert into a full node");
        let Some(i) = self.position_of(after) else {
            panic!("node {after} is not a child");
        };
        self.slots.keys.insert(i, key);
        self.slots.pointers.insert(i + 1, child);
    }

    /// Inserts `key` and `child` after `after` into a full node and splits it.
    ///
    /// The `d − 1` existing keys plus the new one are placed in a scratch node
    /// of capacity `d`. With `m = ⌈d/2⌉`, this node keeps the keys at
    /// `[0, m − 1)` with their children and the returned node receives the
    /// keys at `[m, d)` with theirs. The key at `m − 1` is in neither half; it
    /// is returned to be pushed up into the parent.
    pub fn split_insert_after(
        &mut self,
        key: K,
        child: NodeId,
        after: NodeId,
        degree: usize,
    ) -> (K, Internal<K>) {
        let capacity = self.slots.capacity();
        let scratch = std::mem::replace(&mut self.slots, Slots::new(capacity));
        let mut scratch = Internal {
            slots: scratch.resized(capacity + 1),
        };
        scratch.insert_after(key, child, after);
        let (middle, right) = scratch.split_off(consts::split_point(degree));
        self.slots = scratch.slots.resized(capacity);
        let right = Internal {
            slots: right.slots.resized(capacity),
        };
        (middle, right)
    }

    /// Moves the keys at `[at, len)` and the children at `[at, len]` into a
    /// new node. The key at `at − 1` is removed from this node and returned.
    fn split_off(&mut self, at: usize) -> (K, Internal<K>) {
        assert!(
            at >= 1 && at < self.num_keys(),
            "split point {at} out of range"
        );
        let right = self.slots.split_off(at);
        let Some(middle) = self.slots.keys.pop() else {
            unreachable!("split point is at least 1");
        };
        (middle, Internal { slots: right })
    }

    /// Removes `child` and the separator key to its left, which must equal
    /// `key`.
    pub fn remove_entry(&mut self, key: &K, child: NodeId)
    where
        K: PartialEq,
    {
        let Some(i) = self.position_of(child) else {
            panic!("node {child} is not a child");
        };
        assert!(i >= 1, "the leftmost child has no separator to its left");
        debug_assert!(self.slots.keys[i - 1] == *key, "separator mismatch");
        self.slots.keys.remove(i - 1);
        self.slots.pointers.remove(i);
    }

    /// Appends `separator` followed by every key and child of `right`.
    /// `right` is left empty.
    pub fn merge_from(&mut self, separator: K, right: &mut Internal<K>) {
        assert!(
            self.num_children() + right.num_children() <= self.slots.capacity() + 1,
            "merged node would overflow"
        );
        self.slots.keys.push(separator);
        self.slots.append(&mut right.slots);
        right.slots.clear();
    }

    /// Removes the last key and the last child.
    pub fn pop_last(&mut self) -> (K, NodeId) {
        let (Some(key), Some(child)) = (self.slots.keys.pop(), self.slots.pointers.pop()) else {
            panic!("pop from an internal node without keys");
        };
        (key, child)
    }

    /// Removes the first key and the first child.
    pub fn pop_first(&mut self) -> (K, NodeId) {
        assert!(self.num_keys() > 0, "pop from an internal node without keys");
        self.slots.remove_at(0)
    }

    /// Prepends `child` with `key` as the separator between it and the
    /// current first child.
    pub fn push_front(&mut self, key: K, child: NodeId) {
        self.slots.insert_at(key, child, 0);
    }

    /// Appends `child` with `key` as the separator between the current last
    /// child and it.
    pub fn push_back(&mut self, key: K, child: NodeId) {
        assert!(self.has_room(), "insert into a full node");
        self.slots.keys.push(key);
        self.slots.pointers.push(child);
    }
}

impl<K: Ord> Internal<K> {
    /// Returns the child responsible for `key`.
    pub fn child_for(&self, key: &K) -> NodeId {
        let children = self.slots.pointers();
        match self.slots.find_index_ge(key) {
            None => children[self.num_keys()],
            Some(i) if self.slots.key(i) == key => children[i + 1],
            Some(i) => children[i],
        }
    }
}

impl<K: Clone> Internal<K> {
    /// Replaces the contents with copies of `source`'s keys at
    /// `[begin, end)` and children at `[begin, end]`.
    pub fn copy_range(&mut self, source: &Internal<K>, begin: usize, end: usize) {
        self.slots.copy_range(&source.slots, begin, end);
        self.slots.pointers.push(source.slots.pointers[end]);
    }

    /// Creates a copy of this node's keys and child ids.
    pub fn copy_of(internal: &Internal<K>) -> Self {
        let mut copy = Internal {
            slots: Slots::new(internal.slots.capacity()),
        };
        copy.copy_range(internal, 0, internal.num_keys());
        copy
    }
}
