//! [`Node`] is a enum that wraps either a [`Leaf`] or [`Internal`] node.
//!
//! # Node layout
//!
//! Both node kinds are built on [`Slots`], a pair of parallel arrays bounded
//! by a fixed capacity:
//!
//! ```ignore
//! | keys     | k0 | k1 | ... | k(n-1) |          capacity = d - 1
//! | pointers | p0 | p1 | ... | p(n-1) | p(n)* |  capacity = d
//!
//! * the trailing pointer only exists in internal nodes.
//! ```
//!
//! * In a [`Leaf`], `p(i)` is the value paired with `k(i)`. The successor
//!   link to the next leaf is kept beside the arrays.
//! * In an [`Internal`] node, `p(i)` is the id of a child node. There is
//!   always one more child than there are keys.
//!
//! # A range is divided into subranges by keys
//!
//! Keys in an internal node indicate the range of each child. A root node's
//! range is `[−∞, +∞)`. To divide a range into `n` subranges we need `n − 1`
//! keys. For example, node `["p", "q"]` divides its range `[a, z)` into 3
//! subranges: `[a, p)`, `[p, q)`, `[q, z)`. A key equal to a separator belongs
//! to the subrange on its right.
//!
//! # Degree
//!
//! The degree `d` of a tree is the maximum number of pointers a node may
//! hold. A node holds at most `d − 1` keys. While an insertion is being
//! split, a scratch node one slot larger than usual is built, split in two,
//! and shrunk back to the regular capacity.

pub(crate) mod internal;
pub(crate) mod leaf;

pub(crate) use internal::Internal;
pub(crate) use leaf::Leaf;

/// An enum representing the type of B+ tree node.
#[derive(Debug)]
pub(crate) enum Node<K, V> {
    /// A B+ tree leaf node.
    Leaf(Leaf<K, V>),
    /// A B+ tree internal node.
    Internal(Internal<K>),
}

impl<K, V> Node<K, V> {
    /// Gets the key at a specified node index.
    pub fn key(&self, i: usize) -> &K {
        match self {
            Node::Leaf(leaf) => leaf.key(i),
            Node::Internal(internal) => internal.key(i),
        }
    }

    /// Gets the first key, if the node has any.
    pub fn first_key(&self) -> Option<&K> {
        match self {
            Node::Leaf(leaf) => leaf.first_key(),
            Node::Internal(internal) => internal.first_key(),
        }
    }

    pub fn num_keys(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.num_keys(),
            Node::Internal(internal) => internal.num_keys(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

/// Array-backed storage shared by both node kinds: sorted keys and a
/// parallel array of pointers (values or child ids).
#[derive(Debug, Clone)]
pub(crate) struct Slots<K, P> {
    keys: Vec<K>,
    pointers: Vec<P>,
    capacity: usize,
}

impl<K, P> Slots<K, P> {
    /// Creates empty storage for at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Slots {
            keys: Vec::with_capacity(capacity + 1),
            pointers: Vec::with_capacity(capacity + 2),
            capacity,
        }
    }

    /// Gets the number of keys.
    #[inline]
    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    /// Gets the `i`th key.
    #[inline]
    pub fn key(&self, i: usize) -> &K {
        assert!(
            i < self.keys.len(),
            "key index {i} out of range for {} keys",
            self.keys.len()
        );
        &self.keys[i]
    }

    #[inline]
    pub fn first_key(&self) -> Option<&K> {
        self.keys.first()
    }

    #[inline]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    #[inline]
    pub fn pointers(&self) -> &[P] {
        &self.pointers
    }

    /// Gets the maximum number of keys.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether another key fits.
    #[inline]
    pub fn has_room(&self) -> bool {
        self.keys.len() < self.capacity
    }

    /// Changes the key capacity, e.g. to build an oversized scratch node
    /// during a split.
    pub fn resized(mut self, capacity: usize) -> Self {
        assert!(
            self.keys.len() <= capacity,
            "cannot shrink {} keys into capacity {capacity}",
            self.keys.len()
        );
        self.capacity = capacity;
        self
    }

    /// Inserts `key` and `pointer` at `pos`, shifting everything at or after
    /// `pos` one slot to the right.
    pub fn insert_at(&mut self, key: K, pointer: P, pos: usize) {
        assert!(self.has_room(), "insert into a full node");
        self.keys.insert(pos, key);
        self.pointers.insert(pos, pointer);
    }

    /// Removes the key and pointer at `pos`, shifting the rest left.
    pub fn remove_at(&mut self, pos: usize) -> (K, P) {
        (self.keys.remove(pos), self.pointers.remove(pos))
    }

    /// Moves the keys at `[at, len)` and the pointers at `[at, len)` into new
    /// storage of the same capacity.
    pub fn split_off(&mut self, at: usize) -> Self {
        Slots {
            keys: self.keys.split_off(at),
            pointers: self.pointers.split_off(at),
            capacity: self.capacity,
        }
    }

    /// Moves every key and pointer of `other` to the end of `self`.
    pub fn append(&mut self, other: &mut Self) {
        self.keys.append(&mut other.keys);
        self.pointers.append(&mut other.pointers);
    }

    /// Resets to empty.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.pointers.clear();
    }
}

impl<K: Ord, P> Slots<K, P> {
    /// Returns the smallest index `i` such that `keys[i] >= key`.
    pub fn find_index_ge(&self, key: &K) -> Option<usize> {
        let i = self.keys.partition_point(|k| k < key);
        (i < self.keys.len()).then_some(i)
    }

    /// Returns the largest index `i` such that `keys[i] < key`.
    pub fn find_index_l(&self, key: &K) -> Option<usize> {
        self.keys.partition_point(|k| k < key).checked_sub(1)
    }
}

impl<K: Clone, P: Clone> Slots<K, P> {
    /// Replaces the contents with copies of `source`'s keys and pointers at
    /// `[begin, end)`.
    pub fn copy_range(&mut self, source: &Self, begin: usize, end: usize) {
        assert!(
            end - begin <= self.capacity,
            "range of {} keys exceeds capacity {}",
            end - begin,
            self.capacity
        );
        self.keys.clear();
        self.keys.extend_from_slice(&source.keys[begin..end]);
        self.pointers.clear();
        self.pointers.extend_from_slice(&source.pointers[begin..end]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots_of(pairs: &[(u32, char)], capacity: usize) -> Slots<u32, char> {
        let mut slots = Slots::new(capacity);
        for (i, &(k, p)) in pairs.iter().enumerate() {
            slots.insert_at(k, p, i);
        }
        slots
    }

    #[test]
    fn test_find_index_ge() {
        let slots = slots_of(&[(10, 'a'), (20, 'b'), (30, 'c')], 3);
        assert_eq!(slots.find_index_ge(&5), Some(0));
        assert_eq!(slots.find_index_ge(&10), Some(0));
        assert_eq!(slots.find_index_ge(&11), Some(1));
        assert_eq!(slots.find_index_ge(&30), Some(2));
        assert_eq!(slots.find_index_ge(&31), None);
    }

    #[test]
    fn test_find_index_l() {
        let slots = slots_of(&[(10, 'a'), (20, 'b'), (30, 'c')], 3);
        assert_eq!(slots.find_index_l(&5), None);
        assert_eq!(slots.find_index_l(&10), None);
        assert_eq!(slots.find_index_l(&11), Some(0));
        assert_eq!(slots.find_index_l(&30), Some(1));
        assert_eq!(slots.find_index_l(&99), Some(2));
    }

    #[test]
    fn test_insert_at_shifts_right() {
        let mut slots = slots_of(&[(10, 'a'), (30, 'c')], 3);
        assert!(slots.has_room());
        slots.insert_at(20, 'b', 1);
        assert_eq!(slots.keys(), &[10, 20, 30]);
        assert_eq!(slots.pointers(), &['a', 'b', 'c']);
        assert!(!slots.has_room());
    }

    #[test]
    #[should_panic(expected = "insert into a full node")]
    fn test_insert_at_without_room() {
        let mut slots = slots_of(&[(10, 'a'), (20, 'b')], 2);
        slots.insert_at(30, 'c', 2);
    }

    #[test]
    fn test_copy_range() {
        let source = slots_of(&[(10, 'a'), (20, 'b'), (30, 'c'), (40, 'd')], 4);
        let mut dest = slots_of(&[(1, 'z')], 2);
        dest.copy_range(&source, 1, 3);
        assert_eq!(dest.keys(), &[20, 30]);
        assert_eq!(dest.pointers(), &['b', 'c']);
        // The source is left untouched.
        assert_eq!(source.num_keys(), 4);
    }

    #[test]
    fn test_split_off_and_append() {
        let mut left = slots_of(&[(10, 'a'), (20, 'b'), (30, 'c')], 3);
        let mut right = left.split_off(2);
        assert_eq!(left.keys(), &[10, 20]);
        assert_eq!(right.keys(), &[30]);
        assert_eq!(right.capacity(), 3);

        left.append(&mut right);
        assert_eq!(left.keys(), &[10, 20, 30]);
        assert_eq!(left.pointers(), &['a', 'b', 'c']);
        assert_eq!(right.num_keys(), 0);
    }

    #[test]
    fn test_clear() {
        let mut slots = slots_of(&[(10, 'a'), (20, 'b')], 2);
        slots.clear();
        assert_eq!(slots.num_keys(), 0);
        assert!(slots.pointers().is_empty());
        assert!(slots.first_key().is_none());
        assert!(slots.has_room());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_key_out_of_range() {
        let slots = slots_of(&[(10, 'a')], 2);
        let _ = slots.key(1);
    }
}
