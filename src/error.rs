//! Error types for cover tree construction and queries.

use thiserror::Error;

use crate::Scalar;

/// Errors surfaced by tree constructors, mutation and queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoverTreeError {
    /// The covering base must be strictly greater than one.
    #[error("base must be greater than 1, got {0}")]
    InvalidBase(Scalar),

    /// A point with no coordinates was passed to a constructor.
    #[error("point has no coordinates")]
    EmptyPoint,

    /// A batch constructor received no points.
    #[error("input batch is empty")]
    EmptyBatch,

    /// An inserted point does not match the tree's established dimension.
    #[error("dimension mismatch: tree stores {expected}-dimensional points, got {got}")]
    DimensionMismatch {
        /// Dimension fixed by the first point of the tree.
        expected: usize,
        /// Dimension of the offending point.
        got: usize,
    },

    /// A k-nearest query asked for zero neighbours.
    #[error("k must be at least 1")]
    ZeroNeighbours,

    /// A range query was given a non-positive radius.
    #[error("range must be positive, got {0}")]
    InvalidRange(Scalar),

    /// Merge called with a receiver whose root is below the argument's root.
    #[error("merge receiver root level {receiver} is below argument root level {argument}")]
    MergeOrder {
        /// Root level of the receiving tree.
        receiver: i32,
        /// Root level of the consumed tree.
        argument: i32,
    },

    /// Merge called on trees built with different bases.
    #[error("merge requires equal bases: {0} != {1}")]
    BaseMismatch(Scalar, Scalar),

    /// A level left the range covered by the precomputed power table.
    #[error("level {0} is outside the precomputed scale range")]
    ScaleOutOfRange(i32),
}

/// Result type alias for cover tree operations.
pub type Result<T> = std::result::Result<T, CoverTreeError>;
