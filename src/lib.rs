//! # bplus-index
//!
//! An in-memory B+ tree index: an ordered map from keys to values with point
//! lookups, ordered scans along chained leaves, and insertion and deletion
//! that keep every node between half full and full for a fixed degree.
//!
//! ## Example
//!
//! ```rust
//! # use bplus_index::{BPlusTree, Result};
//! # fn main() -> Result<()> {
//! let mut tree = BPlusTree::builder().degree(3).build()?;
//! for k in 1..=5 {
//!     tree.insert(k, k * 10)?;
//! }
//!
//! // The root separates the leaves [1, 2], [3, 4] and [5].
//! let root = tree.root();
//! assert!(!root.is_leaf());
//! assert_eq!(root.keys(), &[3, 5]);
//!
//! // Deletion matches both the key and the value.
//! tree.delete(&3, &30)?;
//! let keys: Vec<_> = tree.iter().map(|(k, _)| *k).collect();
//! assert_eq!(keys, vec![1, 2, 4, 5]);
//!
//! // A clone shares no nodes with the original.
//! let snapshot = tree.clone();
//! tree.remove(&1)?;
//! assert_eq!(snapshot.get(&1), Some(&10));
//! # Ok(())
//! # }
//! ```
pub mod consts;
mod error;
mod tree;

pub use error::TreeError;
pub use tree::{BPlusTree, Iter, NodeId, NodeRef, Range, TreeBuilder};

pub type Result<T> = std::result::Result<T, TreeError>;
