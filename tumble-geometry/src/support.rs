//! The support-mapping capability trait and its feature query.

use nalgebra::{Point3, Vector3};
use tumble_types::{BodyState, Result};

/// Component tolerance used by [`SupportMap::support_feature`].
///
/// After transforming the query direction into shape-local space, a component
/// whose magnitude falls below this value counts as lying in that axis's
/// face/edge plane.
pub const FEATURE_TOLERANCE: f64 = 0.09;

/// The minimal feature of a convex shape extremal along a direction.
///
/// For a box this is a vertex, an edge (2 points) or a face (4 points). Face
/// points are wound counter-clockwise with respect to the outward axis so
/// callers can treat them as a consistently oriented polygon.
#[derive(Debug, Clone, PartialEq)]
pub enum SupportFeature {
    /// A single extremal vertex.
    Vertex(Point3<f64>),
    /// An extremal edge.
    Edge([Point3<f64>; 2]),
    /// An extremal face, counter-clockwise wound.
    Face([Point3<f64>; 4]),
}

impl SupportFeature {
    /// The feature's points as a slice.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        match self {
            Self::Vertex(p) => std::slice::from_ref(p),
            Self::Edge(ps) => ps,
            Self::Face(ps) => ps,
        }
    }

    /// Number of points in the feature (1, 2 or 4).
    #[must_use]
    pub fn len(&self) -> usize {
        self.points().len()
    }

    /// Always false; a feature has at least one point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Minkowski support mapping of a convex shape attached to a body.
///
/// Queries take the owning body's [`BodyState`] explicitly; shapes do not
/// hold body references.
pub trait SupportMap {
    /// The farthest point of the shape along `direction`, in world space.
    ///
    /// Exact for polytopes: the result is always an actual vertex of the
    /// shape, with no tolerance applied.
    fn support_point(&self, body: &BodyState, direction: &Vector3<f64>) -> Point3<f64>;

    /// The minimal extremal feature along `direction`, in world space.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicsError::DegenerateSupportDirection`] when the
    /// direction is degenerate for the shape (for a box: all three local
    /// components within [`FEATURE_TOLERANCE`]).
    ///
    /// [`DynamicsError::DegenerateSupportDirection`]: tumble_types::DynamicsError::DegenerateSupportDirection
    fn support_feature(&self, body: &BodyState, direction: &Vector3<f64>)
        -> Result<SupportFeature>;
}
