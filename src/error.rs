//! Errors returned by [`crate::BPlusTree`].

/// An error type for `mod tree`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Invalid degree: {0} is less than MIN_DEGREE")]
    InvalidDegree(usize), // usize is the rejected degree
    #[error("Key already exists")]
    AlreadyExists,
    #[error("Key not found")]
    KeyNotFound,
    #[error("Invariant violated: {0}")]
    Invariant(String),
}
