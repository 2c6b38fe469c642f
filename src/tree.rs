//! An in-memory B+ tree is a balanced search tree that keeps every key-value
//! pair in its leaves. Internal nodes only hold separator keys that route a
//! search towards the leaf responsible for a key, and the leaves are chained
//! left to right so that an ordered scan never has to climb back up the tree.
//!
//! Nodes do not know their parents. Whenever a split or an underflow has to be
//! propagated upwards, the parent is located again with a fresh top-down
//! search from the root, routed by the first key of the node (or by the key
//! that was just removed from it, if the node has become empty).
//!
//! Insertion splits a full node into two and copies (leaf) or promotes
//! (internal) a separator into the parent, growing a new root when the root
//! itself splits. Deletion removes an entry and, if the node drops under its
//! minimum occupancy, either merges it with a sibling or borrows a single
//! entry from one, collapsing the root when it is left with one child.

mod iter;
mod node;
mod node_store;

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};

use crate::consts;
use crate::error::TreeError;
pub use iter::{Iter, Range};
use node::{Internal, Leaf, Node};
pub use node_store::NodeId;
use node_store::NodeStore;

type Result<T> = std::result::Result<T, TreeError>;

/// A B+ tree mapping keys of type `K` to values of type `V`.
///
/// Every node holds at most `degree − 1` keys, and every node other than the
/// root stays at least half full after each completed mutation.
#[derive(Debug)]
pub struct BPlusTree<K, V> {
    degree: usize,
    root: NodeId,
    store: NodeStore<K, V>,
    len: usize,
}

/// Builds a [`BPlusTree`] with the desired configuration.
pub struct TreeBuilder<K, V> {
    degree: usize,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> TreeBuilder<K, V> {
    /// Creates a builder set to [`consts::DEFAULT_DEGREE`].
    pub fn new() -> Self {
        TreeBuilder {
            degree: consts::DEFAULT_DEGREE,
            _marker: PhantomData,
        }
    }

    /// Sets the maximum number of pointers a node may hold.
    pub fn degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    /// Builds an empty tree. Fails if the degree is less than
    /// [`consts::MIN_DEGREE`].
    pub fn build(self) -> Result<BPlusTree<K, V>> {
        if self.degree < consts::MIN_DEGREE {
            return Err(TreeError::InvalidDegree(self.degree));
        }
        Ok(BPlusTree::with_degree(self.degree))
    }
}

impl<K, V> Default for TreeBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for TreeBuilder<K, V> {
    fn clone(&self) -> Self {
        TreeBuilder {
            degree: self.degree,
            _marker: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for TreeBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("degree", &self.degree)
            .finish()
    }
}

impl<K, V> BPlusTree<K, V> {
    /// Creates an empty tree of the given degree.
    pub fn new(degree: usize) -> Result<Self> {
        TreeBuilder::new().degree(degree).build()
    }

    pub fn builder() -> TreeBuilder<K, V> {
        TreeBuilder::new()
    }

    fn with_degree(degree: usize) -> Self {
        let mut store = NodeStore::new();
        let root = store.alloc(Node::Leaf(Leaf::new(degree)));
        tracing::debug!(degree, "created tree");
        BPlusTree {
            degree,
            root,
            store,
            len: 0,
        }
    }

    /// Gets the maximum number of pointers a node may hold.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Gets the number of key-value pairs in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Gets a read-only handle to the root node.
    pub fn root(&self) -> NodeRef<'_, K, V> {
        self.node_ref(self.root)
    }

    /// Gets the number of levels in the tree. A tree whose root is a leaf has
    /// height 1.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut current = self.root;
        while let Node::Internal(internal) = self.store.read(current) {
            current = internal.children()[0];
            height += 1;
        }
        height
    }

    /// Returns an iterator over all key-value pairs, in key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.store, self.leftmost_leaf(), self.len)
    }

    fn node_ref(&self, id: NodeId) -> NodeRef<'_, K, V> {
        NodeRef {
            store: &self.store,
            id,
        }
    }

    fn leftmost_leaf(&self) -> NodeId {
        let mut current = self.root;
        while let Node::Internal(internal) = self.store.read(current) {
            current = internal.children()[0];
        }
        current
    }

    fn is_underflow(&self, id: NodeId) -> bool {
        match self.store.read(id) {
            Node::Leaf(leaf) => leaf.num_keys() < consts::min_leaf_keys(self.degree),
            Node::Internal(internal) => {
                internal.num_children() < consts::min_children(self.degree)
            }
        }
    }

    /// Whether the entries of two adjacent siblings fit in a single node.
    fn can_merge(&self, left: NodeId, right: NodeId) -> bool {
        match (self.store.read(left), self.store.read(right)) {
            (Node::Leaf(l), Node::Leaf(r)) => {
                l.num_keys() + r.num_keys() <= consts::max_keys(self.degree)
            }
            (Node::Internal(l), Node::Internal(r)) => {
                l.num_children() + r.num_children() <= self.degree
            }
            _ => unreachable!("siblings {left} and {right} are of different kinds"),
        }
    }

    /// Makes the only child of an internal root the new root.
    fn try_collapse_root(&mut self) {
        let Node::Internal(root) = self.store.read(self.root) else {
            return;
        };
        if root.num_children() != 1 {
            return;
        }
        let child = root.children()[0];
        let old_root = std::mem::replace(&mut self.root, child);
        self.store.free(old_root);
        tracing::debug!(%old_root, root = %child, "collapsed root");
    }
}

impl<K: Ord, V> BPlusTree<K, V> {
    /// Finds the leaf responsible for `key`, whether or not it holds `key`.
    pub fn find(&self, key: &K) -> NodeRef<'_, K, V> {
        self.node_ref(self.find_leaf(key))
    }

    fn find_leaf(&self, key: &K) -> NodeId {
        let mut current = self.root;
        while let Node::Internal(internal) = self.store.read(current) {
            current = internal.child_for(key);
        }
        tracing::trace!(leaf = %current, "descended to leaf");
        current
    }

    /// Finds the parent of a node by searching down from the root, routed by
    /// the node's first key. Returns `None` for the root and for a node that
    /// is not reachable from the root.
    ///
    /// Between mutations every node other than the root holds at least one
    /// key, so an empty node is always the root.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not name a node of this tree.
    pub fn find_parent(&self, node: NodeId) -> Option<NodeId> {
        if node == self.root {
            return None;
        }
        let key = self.store.read(node).first_key()?;
        self.find_parent_by(node, key)
    }

    fn find_parent_by(&self, node: NodeId, key: &K) -> Option<NodeId> {
        let mut current = self.root;
        while let Node::Internal(internal) = self.store.read(current) {
            let child = internal.child_for(key);
            if child == node {
                return Some(current);
            }
            current = child;
        }
        None
    }

    /// Gets the value corresponding to the key.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.store.leaf(self.find_leaf(key)).get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns an iterator over the key-value pairs whose keys lie within
    /// `range`, in key order.
    pub fn range<R>(&self, range: R) -> Range<'_, K, V>
    where
        R: RangeBounds<K>,
        K: Clone,
    {
        let (leaf, start) = match range.start_bound() {
            Bound::Unbounded => (self.leftmost_leaf(), 0),
            Bound::Included(start) => {
                let leaf = self.find_leaf(start);
                let i = self.store.leaf(leaf).keys().partition_point(|k| k < start);
                (leaf, i)
            }
            Bound::Excluded(start) => {
                let leaf = self.find_leaf(start);
                let i = self.store.leaf(leaf).keys().partition_point(|k| k <= start);
                (leaf, i)
            }
        };
        Range::new(&self.store, leaf, start, range.end_bound().cloned())
    }

    /// Checks the structural invariants of the tree: key order and ranges,
    /// node occupancy, uniform leaf depth, the leaf chain and the entry count.
    pub fn validate(&self) -> Result<()> {
        let mut leaves = Vec::new();
        let mut nodes = 0;
        let (count, _) = self.validate_node(self.root, None, None, &mut leaves, &mut nodes)?;
        if count != self.len {
            return Err(TreeError::Invariant(format!(
                "tree holds {count} entries but its length is {}",
                self.len
            )));
        }
        if nodes != self.store.len() {
            return Err(TreeError::Invariant(format!(
                "{} nodes are allocated but only {nodes} are reachable",
                self.store.len()
            )));
        }

        let mut expected = leaves.iter();
        let mut current = Some(self.leftmost_leaf());
        while let Some(id) = current {
            if expected.next() != Some(&id) {
                return Err(TreeError::Invariant(format!(
                    "leaf chain reaches node {id} out of order"
                )));
            }
            current = self.store.leaf(id).successor();
        }
        if let Some(id) = expected.next() {
            return Err(TreeError::Invariant(format!(
                "leaf {id} is missing from the leaf chain"
            )));
        }
        Ok(())
    }

    /// Validates the subtree at `id`, whose keys must lie in `[lo, hi)`.
    /// Returns the number of entries and the height of the subtree.
    fn validate_node(
        &self,
        id: NodeId,
        lo: Option<&K>,
        hi: Option<&K>,
        leaves: &mut Vec<NodeId>,
        nodes: &mut usize,
    ) -> Result<(usize, usize)> {
        *nodes += 1;
        let is_root = id == self.root;
        let node = self.store.read(id);
        let keys = match node {
            Node::Leaf(leaf) => leaf.keys(),
            Node::Internal(internal) => internal.keys(),
        };
        if keys.len() > consts::max_keys(self.degree) {
            return Err(TreeError::Invariant(format!(
                "node {id} holds {} keys",
                keys.len()
            )));
        }
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TreeError::Invariant(format!(
                "keys of node {id} are not strictly increasing"
            )));
        }
        let below = lo.is_some_and(|lo| keys.first().is_some_and(|k| k < lo));
        let above = hi.is_some_and(|hi| keys.last().is_some_and(|k| k >= hi));
        if below || above {
            return Err(TreeError::Invariant(format!(
                "keys of node {id} fall outside the range given by its ancestors"
            )));
        }

        match node {
            Node::Leaf(leaf) => {
                if !is_root && leaf.num_keys() < consts::min_leaf_keys(self.degree) {
                    return Err(TreeError::Invariant(format!(
                        "leaf {id} holds only {} keys",
                        leaf.num_keys()
                    )));
                }
                leaves.push(id);
                Ok((leaf.num_keys(), 1))
            }
            Node::Internal(internal) => {
                let num_children = internal.num_children();
                if num_children != internal.num_keys() + 1 {
                    return Err(TreeError::Invariant(format!(
                        "internal node {id} has {} keys and {num_children} children",
                        internal.num_keys()
                    )));
                }
                let min_children = if is_root {
                    2
                } else {
                    consts::min_children(self.degree)
                };
                if num_children < min_children {
                    return Err(TreeError::Invariant(format!(
                        "internal node {id} has only {num_children} children"
                    )));
                }

                let mut count = 0;
                let mut height = None;
                for (i, &child) in internal.children().iter().enumerate() {
                    let child_lo = if i == 0 { lo } else { Some(internal.key(i - 1)) };
                    let child_hi = if i == internal.num_keys() {
                        hi
                    } else {
                        Some(internal.key(i))
                    };
                    let (entries, h) = self.validate_node(child, child_lo, child_hi, leaves, nodes)?;
                    count += entries;
                    match height {
                        None => height = Some(h),
                        Some(prev) if prev != h => {
                            return Err(TreeError::Invariant(format!(
                                "children of node {id} have heights {prev} and {h}"
                            )));
                        }
                        Some(_) => {}
                    }
                }
                Ok((count, height.unwrap_or(0) + 1))
            }
        }
    }
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Inserts a key-value pair. Fails if the key is already present, in
    /// which case the tree is left unchanged.
    pub fn insert(&mut self, key: K, val: V) -> Result<()> {
        let leaf_id = self.find_leaf(&key);
        let leaf = self.store.leaf_mut(leaf_id);
        if leaf.get(&key).is_some() {
            return Err(TreeError::AlreadyExists);
        }
        self.len += 1;
        if leaf.has_room() {
            leaf.insert(key, val);
            return Ok(());
        }

        let right = leaf.split_insert(key, val, self.degree);
        let Some(separator) = right.first_key().cloned() else {
            unreachable!("the right half of a split leaf is never empty");
        };
        let right_id = self.store.alloc(Node::Leaf(right));
        let successor = self.store.leaf_mut(leaf_id).set_successor(Some(right_id));
        self.store.leaf_mut(right_id).set_successor(successor);
        tracing::debug!(left = %leaf_id, right = %right_id, "split leaf");
        self.insert_in_parent(leaf_id, separator, right_id);
        Ok(())
    }

    /// Links `right`, the new sibling split off from `left`, into the parent
    /// of `left` under `key`, splitting ancestors as needed.
    fn insert_in_parent(&mut self, left: NodeId, key: K, right: NodeId) {
        if left == self.root {
            let root = Internal::parent_of_split(left, key, right, self.degree);
            self.root = self.store.alloc(Node::Internal(root));
            tracing::debug!(root = %self.root, height = self.height(), "grew root");
            return;
        }

        let Some(parent_id) = self.find_parent(left) else {
            panic!("node {left} is not reachable from the root");
        };
        let parent = self.store.internal_mut(parent_id);
        if parent.has_room() {
            parent.insert_after(key, right, left);
            return;
        }
        let (middle, sibling) = parent.split_insert_after(key, right, left, self.degree);
        let sibling_id = self.store.alloc(Node::Internal(sibling));
        tracing::debug!(left = %parent_id, right = %sibling_id, "split internal node");
        self.insert_in_parent(parent_id, middle, sibling_id);
    }

    /// Deletes the entry matching both `key` and `val`. Fails if there is no
    /// such entry, in which case the tree is left unchanged.
    pub fn delete(&mut self, key: &K, val: &V) -> Result<()>
    where
        V: PartialEq,
    {
        let leaf = self.find_leaf(key);
        let i = self
            .store
            .leaf(leaf)
            .position(key, val)
            .ok_or(TreeError::KeyNotFound)?;
        self.delete_entry(leaf, i);
        Ok(())
    }

    /// Removes the entry stored under `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Result<V> {
        let leaf = self.find_leaf(key);
        let i = self
            .store
            .leaf(leaf)
            .keys()
            .binary_search(key)
            .map_err(|_| TreeError::KeyNotFound)?;
        Ok(self.delete_entry(leaf, i))
    }

    /// Removes the `i`th entry of a leaf and restores the occupancy of the
    /// tree.
    fn delete_entry(&mut self, leaf: NodeId, i: usize) -> V {
        let (key, val) = self.store.leaf_mut(leaf).remove_at(i);
        self.len -= 1;
        self.try_fix_underflow(leaf, &key);
        val
    }

    /// Removes `child` and the separator `key` to its left from an internal
    /// node and restores the occupancy of the tree.
    fn delete_child_entry(&mut self, node: NodeId, key: K, child: NodeId) {
        self.store.internal_mut(node).remove_entry(&key, child);
        self.try_fix_underflow(node, &key);
    }

    /// Fixes `node` after `removed` was deleted from it, if it is under its
    /// minimum occupancy.
    fn try_fix_underflow(&mut self, node: NodeId, removed: &K) {
        if node == self.root {
            self.try_collapse_root();
            return;
        }
        if !self.is_underflow(node) {
            return;
        }

        let route = self.store.read(node).first_key().unwrap_or(removed);
        let Some(parent_id) = self.find_parent_by(node, route) else {
            panic!("node {node} is not reachable from the root");
        };
        let parent = self.store.internal(parent_id);
        let Some(child_idx) = parent.position_of(node) else {
            unreachable!("parent {parent_id} does not hold node {node}");
        };
        let sibling_idx = if child_idx > 0 {
            child_idx - 1
        } else {
            child_idx + 1
        };
        let sibling = parent.children()[sibling_idx];
        let separator_idx = child_idx.min(sibling_idx);
        let (left, right) = if sibling_idx < child_idx {
            (sibling, node)
        } else {
            (node, sibling)
        };

        if self.can_merge(left, right) {
            self.merge(parent_id, separator_idx, left, right);
        } else {
            self.steal(parent_id, separator_idx, node, sibling);
        }
    }

    /// Moves every entry of `right` into `left`, releases `right` and removes
    /// it from the parent.
    fn merge(&mut self, parent: NodeId, separator_idx: usize, left: NodeId, right: NodeId) {
        let separator = self.store.internal(parent).key(separator_idx).clone();
        let mut dissolved = self.store.free(right);
        match (self.store.read_mut(left), &mut dissolved) {
            (Node::Leaf(l), Node::Leaf(r)) => l.merge_from(r),
            (Node::Internal(l), Node::Internal(r)) => l.merge_from(separator.clone(), r),
            _ => unreachable!("siblings {left} and {right} are of different kinds"),
        }
        tracing::debug!(%parent, %left, %right, "merged siblings");
        self.delete_child_entry(parent, separator, right);
    }

    /// Moves one entry from `sibling` into `node` through the parent, and
    /// updates the separator between them.
    fn steal(&mut self, parent: NodeId, separator_idx: usize, node: NodeId, sibling: NodeId) {
        let from_left = self.store.internal(parent).children()[separator_idx] == sibling;
        match (self.store.read(node).is_leaf(), from_left) {
            (true, true) => {
                let (key, val) = self.store.leaf_mut(sibling).pop_last();
                self.store
                    .internal_mut(parent)
                    .set_key(separator_idx, key.clone());
                self.store.leaf_mut(node).push_front(key, val);
            }
            (true, false) => {
                let (key, val) = self.store.leaf_mut(sibling).pop_first();
                self.store.leaf_mut(node).push_back(key, val);
                let Some(first) = self.store.leaf(sibling).first_key().cloned() else {
                    unreachable!("a sibling that cannot merge keeps a key after lending one");
                };
                self.store.internal_mut(parent).set_key(separator_idx, first);
            }
            (false, true) => {
                let (key, child) = self.store.internal_mut(sibling).pop_last();
                let separator = self.store.internal_mut(parent).set_key(separator_idx, key);
                self.store.internal_mut(node).push_front(separator, child);
            }
            (false, false) => {
                let (key, child) = self.store.internal_mut(sibling).pop_first();
                let separator = self.store.internal_mut(parent).set_key(separator_idx, key);
                self.store.internal_mut(node).push_back(separator, child);
            }
        }
        tracing::debug!(%parent, %node, %sibling, from_left, "redistributed entry");
    }
}

impl<K: Clone, V: Clone> BPlusTree<K, V> {
    /// Copies the subtree at `id` into `dst`, appending its leaves to the
    /// chain that ends at `prev_leaf`.
    fn copy_subtree(
        &self,
        id: NodeId,
        dst: &mut NodeStore<K, V>,
        prev_leaf: &mut Option<NodeId>,
    ) -> NodeId {
        match self.store.read(id) {
            Node::Leaf(leaf) => {
                let copy = dst.alloc(Node::Leaf(Leaf::copy_of(leaf)));
                if let Some(prev) = prev_leaf.replace(copy) {
                    dst.leaf_mut(prev).set_successor(Some(copy));
                }
                copy
            }
            Node::Internal(internal) => {
                let mut copy = Internal::copy_of(internal);
                for (i, &child) in internal.children().iter().enumerate() {
                    copy.set_child(i, self.copy_subtree(child, dst, prev_leaf));
                }
                dst.alloc(Node::Internal(copy))
            }
        }
    }
}

impl<K: Clone, V: Clone> Clone for BPlusTree<K, V> {
    /// Creates a deep copy of the tree. No node is shared with the original.
    fn clone(&self) -> Self {
        let mut store = NodeStore::with_capacity(self.store.len());
        let root = self.copy_subtree(self.root, &mut store, &mut None);
        BPlusTree {
            degree: self.degree,
            root,
            store,
            len: self.len,
        }
    }
}

impl<K, V> Default for BPlusTree<K, V> {
    fn default() -> Self {
        Self::with_degree(consts::DEFAULT_DEGREE)
    }
}

impl<'t, K, V> IntoIterator for &'t BPlusTree<K, V> {
    type Item = (&'t K, &'t V);
    type IntoIter = Iter<'t, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A read-only handle to a node of a [`BPlusTree`].
pub struct NodeRef<'t, K, V> {
    store: &'t NodeStore<K, V>,
    id: NodeId,
}

impl<'t, K, V> NodeRef<'t, K, V> {
    fn node(&self) -> &'t Node<K, V> {
        self.store.read(self.id)
    }

    fn with_id(&self, id: NodeId) -> Self {
        NodeRef {
            store: self.store,
            id,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_leaf(&self) -> bool {
        self.node().is_leaf()
    }

    pub fn num_keys(&self) -> usize {
        self.node().num_keys()
    }

    /// Gets the `i`th key.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not less than [`NodeRef::num_keys`].
    pub fn key(&self, i: usize) -> &'t K {
        self.node().key(i)
    }

    pub fn first_key(&self) -> Option<&'t K> {
        self.node().first_key()
    }

    pub fn keys(&self) -> &'t [K] {
        match self.node() {
            Node::Leaf(leaf) => leaf.keys(),
            Node::Internal(internal) => internal.keys(),
        }
    }

    /// Gets the number of children. Leaves have none.
    pub fn num_children(&self) -> usize {
        match self.node() {
            Node::Leaf(_) => 0,
            Node::Internal(internal) => internal.num_children(),
        }
    }

    /// Gets the `i`th child of an internal node. Returns `None` for leaves
    /// and past the last child.
    pub fn child(&self, i: usize) -> Option<Self> {
        match self.node() {
            Node::Leaf(_) => None,
            Node::Internal(internal) => internal.child(i).map(|id| self.with_id(id)),
        }
    }

    /// Gets the `i`th value of a leaf. Returns `None` for internal nodes and
    /// past the last value.
    pub fn value(&self, i: usize) -> Option<&'t V> {
        match self.node() {
            Node::Leaf(leaf) => leaf.value(i),
            Node::Internal(_) => None,
        }
    }

    /// Gets the next leaf in key order.
    pub fn successor(&self) -> Option<Self> {
        match self.node() {
            Node::Leaf(leaf) => leaf.successor().map(|id| self.with_id(id)),
            Node::Internal(_) => None,
        }
    }
}

impl<K, V> Clone for NodeRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NodeRef<'_, K, V> {}

impl<K, V> PartialEq for NodeRef<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.store, other.store) && self.id == other.id
    }
}

impl<K, V> Eq for NodeRef<'_, K, V> {}

impl<K, V> fmt::Debug for NodeRef<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("is_leaf", &self.is_leaf())
            .field("num_keys", &self.num_keys())
            .finish()
    }
}
