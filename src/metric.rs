use crate::Scalar;
use ndarray::{Array1, ArrayView1};

use ndarray_stats::DeviationExt;

/// A point of the metric space: a fixed-length coordinate vector together
/// with a caller-assigned identifier.
///
/// The identifier is opaque to the tree; it travels with the point and comes
/// back out of query results, which is how callers tie neighbours back to
/// their own records. The dimension of the first point handed to a tree fixes
/// the dimension of every later one.
#[derive(Clone, Debug)]
pub struct Point {
    id: usize,
    data: Array1<Scalar>,
}

impl Point {
    /// Creates a point with the given ```id``` and coordinates.
    pub fn new(id: usize, data: Array1<Scalar>) -> Self {
        Self { id, data }
    }

    /// Returns the caller-assigned identifier.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the coordinate vector.
    pub fn data(&self) -> &Array1<Scalar> {
        &self.data
    }

    /// Returns a view of the coordinates.
    pub fn view(&self) -> ArrayView1<'_, Scalar> {
        self.data.view()
    }

    /// Returns the number of coordinates.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns ```true``` if the point has no coordinates.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Placeholder record used for worst-case query initialisation.
    pub(crate) fn sentinel() -> Self {
        Self {
            id: usize::MAX,
            data: Array1::zeros(0),
        }
    }
}

/// Euclidean (L2) distance between two coordinate vectors.
///
/// Both views must have the same length; the tree checks dimensions at its
/// public boundary, so the shape error cannot occur here.
#[inline(always)]
pub(crate) fn distance(a: ArrayView1<'_, Scalar>, b: ArrayView1<'_, Scalar>) -> Scalar {
    a.l2_dist(&b).unwrap()
}
