//! A library for exact nearest neighbour search based on mergeable cover trees.
//!
//! A [`CoverTree`] stores points of a fixed-dimensional Euclidean space and
//! answers single nearest-neighbour, k-nearest and range queries in time that
//! scales with the intrinsic dimension of the data. Trees are built
//! incrementally with [`CoverTree::insert`], in one pass with
//! [`CoverTree::from_batch`], or in parallel over large batches with
//! [`CoverTreeBuilder`], which constructs partial trees on worker threads and
//! fuses them with [`CoverTree::merge`].
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    rustdoc::broken_intra_doc_links
)]

type Scalar = f64;

mod error;
pub use error::{CoverTreeError, Result};

mod metric;
pub use metric::Point;

mod tree;
pub use tree::{CoverTree, CoverTreeBuilder, Neighbour, Points};
