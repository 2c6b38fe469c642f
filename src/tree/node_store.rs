//! An in-memory store of nodes that backs a B+ tree.
//!
//! Nodes never point at each other directly. Internal nodes hold the
//! [`NodeId`]s of their children and leaves hold the [`NodeId`] of their
//! successor, so the tree has a single owner (the store) and no cycles.
//! Released slots are recycled by later allocations.

use std::fmt;

use super::node::{Internal, Leaf, Node};

/// The identifier of a node within a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Gets the raw slot index of the node.
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An arena of nodes. Backed by a vector of slots and a free list.
#[derive(Debug)]
pub(crate) struct NodeStore<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<NodeId>,
}

impl<K, V> NodeStore<K, V> {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new empty store with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        NodeStore {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Gets the number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Moves a node into the store and returns its id.
    pub fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                debug_assert!(self.slots[id.0].is_none());
                self.slots[id.0] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    /// Removes a node from the store and returns it. The id may be handed
    /// out again by a later [`NodeStore::alloc`].
    pub fn free(&mut self, id: NodeId) -> Node<K, V> {
        let Some(node) = self.slots.get_mut(id.0).and_then(Option::take) else {
            panic!("node {id} is not allocated");
        };
        self.free.push(id);
        node
    }

    /// Reads the node at `id`.
    #[inline]
    pub fn read(&self, id: NodeId) -> &Node<K, V> {
        match self.slots.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("node {id} is not allocated"),
        }
    }

    /// Reads the node at `id` for modification.
    #[inline]
    pub fn read_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        match self.slots.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("node {id} is not allocated"),
        }
    }

    /// Reads the node at `id` as a leaf.
    #[inline]
    pub fn leaf(&self, id: NodeId) -> &Leaf<K, V> {
        match self.read(id) {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("node {id} is not a leaf"),
        }
    }

    #[inline]
    pub fn leaf_mut(&mut self, id: NodeId) -> &mut Leaf<K, V> {
        match self.read_mut(id) {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("node {id} is not a leaf"),
        }
    }

    /// Reads the node at `id` as an internal node.
    #[inline]
    pub fn internal(&self, id: NodeId) -> &Internal<K> {
        match self.read(id) {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("node {id} is not an internal node"),
        }
    }

    #[inline]
    pub fn internal_mut(&mut self, id: NodeId) -> &mut Internal<K> {
        match self.read_mut(id) {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("node {id} is not an internal node"),
        }
    }
}

impl<K, V> Default for NodeStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_read_free() {
        let mut store: NodeStore<u32, u32> = NodeStore::new();
        let a = store.alloc(Node::Leaf(Leaf::new(3)));
        let b = store.alloc(Node::Internal(Internal::new(3)));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert!(matches!(store.read(a), Node::Leaf(_)));
        assert!(matches!(store.read(b), Node::Internal(_)));

        store.leaf_mut(a).insert(7, 70);
        assert_eq!(store.leaf(a).get(&7), Some(&70));

        let freed = store.free(a);
        assert!(matches!(freed, Node::Leaf(ref leaf) if leaf.num_keys() == 1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut store: NodeStore<u32, u32> = NodeStore::new();
        let a = store.alloc(Node::Leaf(Leaf::new(3)));
        let _b = store.alloc(Node::Leaf(Leaf::new(3)));
        store.free(a);
        let c = store.alloc(Node::Leaf(Leaf::new(3)));
        assert_eq!(a, c);
        assert_eq!(store.len(), 2);
    }

    #[test]
    #[should_panic(expected = "is not allocated")]
    fn read_after_free_panics() {
        let mut store: NodeStore<u32, u32> = NodeStore::new();
        let a = store.alloc(Node::Leaf(Leaf::new(3)));
        store.free(a);
        let _ = store.read(a);
    }

    #[test]
    #[should_panic(expected = "is not a leaf")]
    fn leaf_of_internal_panics() {
        let mut store: NodeStore<u32, u32> = NodeStore::new();
        let a = store.alloc(Node::Internal(Internal::new(3)));
        let _ = store.leaf(a);
    }
}
