//! Constants related to node fan-out.

/// The smallest degree a tree accepts. A degree of 2 cannot hold one
/// separator key while also keeping `⌈d/2⌉` children per internal node.
pub const MIN_DEGREE: usize = 3;

/// The degree used by [`crate::BPlusTree::default`].
pub const DEFAULT_DEGREE: usize = 32;

const _: () = {
    assert!(MIN_DEGREE >= 3, "degree 2 cannot satisfy occupancy bounds");
    assert!(
        DEFAULT_DEGREE >= MIN_DEGREE,
        "default degree must be a valid degree"
    );
};

/// Maximum number of keys in a node of degree `d`.
#[inline]
pub(crate) const fn max_keys(degree: usize) -> usize {
    degree - 1
}

/// Minimum number of keys a non-root leaf must hold.
#[inline]
pub(crate) const fn min_leaf_keys(degree: usize) -> usize {
    (degree - 1).div_ceil(2)
}

/// Minimum number of children a non-root internal node must hold.
#[inline]
pub(crate) const fn min_children(degree: usize) -> usize {
    degree.div_ceil(2)
}

/// Index at which an overflowing node of degree `d` is split.
#[inline]
pub(crate) const fn split_point(degree: usize) -> usize {
    degree.div_ceil(2)
}
