//! Oriented box geometry with an exact support mapping.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use tumble_types::{BodyId, BodyState, DynamicsError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::material::Material;
use crate::support::{SupportFeature, SupportMap, FEATURE_TOLERANCE};

/// A convex box shape attached to a rigid body.
///
/// The box is described by its three side lengths and a local frame
/// (rotation + displacement) relative to the owning body's centre of mass.
/// Its mass is the product of the side lengths, a density-normalized volume
/// proxy rather than a calibrated physical unit.
///
/// The cached `local_transform` is `local_rotation · diag(x, y, z)`; it is
/// recomputed whenever the side lengths or the local frame change. Changing
/// either also changes the owning body's mass distribution, so the body's
/// finalize step must be re-run afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoxGeometry {
    extents: Vector3<f64>,
    local_rotation: Matrix3<f64>,
    local_displacement: Vector3<f64>,
    local_transform: Matrix3<f64>,
    envelope: f64,
    mass: f64,
    body: Option<BodyId>,
    /// Surface material of the box.
    pub material: Material,
}

impl BoxGeometry {
    /// Create a box with the given side lengths, centred on the body origin.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::with_displacement(x, y, z, Vector3::zeros())
    }

    /// Create a box with the given side lengths and a local displacement.
    #[must_use]
    pub fn with_displacement(x: f64, y: f64, z: f64, displacement: Vector3<f64>) -> Self {
        let mut geometry = Self {
            extents: Vector3::new(x, y, z),
            local_rotation: Matrix3::identity(),
            local_displacement: Vector3::zeros(),
            local_transform: Matrix3::identity(),
            envelope: 0.125,
            mass: x * y * z,
            body: None,
            material: Material::default(),
        };
        geometry.set_local_transform(Matrix3::identity(), displacement);
        geometry
    }

    /// The three side lengths.
    #[must_use]
    pub fn side_lengths(&self) -> Vector3<f64> {
        self.extents
    }

    /// Set new side lengths.
    ///
    /// Recomputes the box mass and the cached local transform. The owning
    /// body's finalize step must be re-run to pick up the changed mass
    /// distribution.
    pub fn set_side_lengths(&mut self, x: f64, y: f64, z: f64) {
        self.extents = Vector3::new(x, y, z);
        self.mass = x * y * z;
        self.set_local_transform(self.local_rotation, self.local_displacement);
    }

    /// Mass of the box (product of side lengths).
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Override the box mass without changing its dimensions.
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
    }

    /// Collision envelope (skin) distance.
    #[must_use]
    pub fn envelope(&self) -> f64 {
        self.envelope
    }

    /// Set the collision envelope distance.
    pub fn set_envelope(&mut self, envelope: f64) {
        self.envelope = envelope;
    }

    /// The owning body, if the body's finalize step has run.
    #[must_use]
    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    /// Record the owning body. Called by the body's finalize step.
    pub fn set_body(&mut self, body: Option<BodyId>) {
        self.body = body;
    }

    /// Local rotation relative to the owning body.
    #[must_use]
    pub fn local_rotation(&self) -> Matrix3<f64> {
        self.local_rotation
    }

    /// Local displacement relative to the owning body's centre of mass.
    #[must_use]
    pub fn local_displacement(&self) -> Vector3<f64> {
        self.local_displacement
    }

    /// Set the local frame relative to the owning body.
    ///
    /// Recomputes the cached `rotation · diag(x, y, z)` transform. The owning
    /// body's finalize step must be re-run if the mass distribution changed.
    pub fn set_local_transform(&mut self, rotation: Matrix3<f64>, displacement: Vector3<f64>) {
        self.local_rotation = rotation;
        self.local_displacement = displacement;
        self.local_transform = rotation * Matrix3::from_diagonal(&self.extents);
    }

    /// Closed-form box inertia tensor about its own centre.
    ///
    /// `diag(m(y²+z²), m(x²+z²), m(x²+y²)) / 12`
    #[must_use]
    pub fn inertia_matrix(&self) -> Matrix3<f64> {
        let (x, y, z) = (self.extents.x, self.extents.y, self.extents.z);
        Matrix3::from_diagonal(&Vector3::new(
            self.mass * (y * y + z * z) / 12.0,
            self.mass * (x * x + z * z) / 12.0,
            self.mass * (x * x + y * y) / 12.0,
        ))
    }

    /// The box's full world transform, composing the body transform with the
    /// scaled local frame. Suitable for handing to a renderer.
    #[must_use]
    pub fn world_transform(&self, body: &BodyState) -> Matrix4<f64> {
        let mut local = Matrix4::identity();
        local
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.local_transform);
        local
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&self.local_displacement);
        body.transform * local
    }

    /// Maximum world-space bounding extents, expanded by the envelope.
    ///
    /// Computed from the support points along the box's own (body-combined)
    /// local axes rather than the world axes, which is exact for the box and
    /// avoids a full 8-corner sweep.
    #[must_use]
    pub fn max_bounds(&self, body: &BodyState) -> Point3<f64> {
        self.directional_bounds(body, 1.0) + Vector3::repeat(self.envelope)
    }

    /// Minimum world-space bounding extents, expanded by the envelope.
    #[must_use]
    pub fn min_bounds(&self, body: &BodyState) -> Point3<f64> {
        self.directional_bounds(body, -1.0) - Vector3::repeat(self.envelope)
    }

    /// Shared bound computation; `sign` selects max (+1) or min (-1) bounds.
    fn directional_bounds(&self, body: &BodyState, sign: f64) -> Point3<f64> {
        let combined = (body.rotation * self.local_rotation).transpose();

        // the rows of (R_body · R_local) are the box axes the support points
        // are taken along; scale the signed corner by the side lengths
        let corner = |axis: Vector3<f64>| -> Vector3<f64> {
            let axis = axis * sign;
            let signed = Vector3::new(
                self.extents.x * if axis.x < 0.0 { -0.5 } else { 0.5 },
                self.extents.y * if axis.y < 0.0 { -0.5 } else { 0.5 },
                self.extents.z * if axis.z < 0.0 { -0.5 } else { 0.5 },
            );
            self.local_rotation * signed + self.local_displacement
        };

        let px = corner(combined.column(0).into());
        let py = corner(combined.column(1).into());
        let pz = corner(combined.column(2).into());

        let extreme = Vector3::new(
            body.rotation.row(0).transpose().dot(&px),
            body.rotation.row(1).transpose().dot(&py),
            body.rotation.row(2).transpose().dot(&pz),
        );
        body.position + extreme
    }

    /// Map a point in canonical box space (±0.5 per axis) to world space.
    fn to_world_point(&self, body: &BodyState, canonical: Vector3<f64>) -> Point3<f64> {
        body.position
            + body.rotation * (self.local_transform * canonical + self.local_displacement)
    }
}

impl SupportMap for BoxGeometry {
    fn support_point(&self, body: &BodyState, direction: &Vector3<f64>) -> Point3<f64> {
        // into canonical box space, pick the matching corner, back out
        let v = (body.rotation * self.local_rotation).transpose() * direction;
        let corner = Vector3::new(
            if v.x < 0.0 { -0.5 } else { 0.5 },
            if v.y < 0.0 { -0.5 } else { 0.5 },
            if v.z < 0.0 { -0.5 } else { 0.5 },
        );
        self.to_world_point(body, corner)
    }

    fn support_feature(
        &self,
        body: &BodyState,
        direction: &Vector3<f64>,
    ) -> Result<SupportFeature> {
        let v = (body.rotation * self.local_rotation).transpose() * direction;

        let mut zero_axes = [0usize; 3];
        let mut nonzero_axes = [0usize; 3];
        let mut num_zero = 0;
        let mut num_nonzero = 0;
        for (axis, component) in [v.x, v.y, v.z].into_iter().enumerate() {
            if component.abs() < FEATURE_TOLERANCE {
                zero_axes[num_zero] = axis;
                num_zero += 1;
            } else {
                nonzero_axes[num_nonzero] = axis;
                num_nonzero += 1;
            }
        }

        let signed = Vector3::new(
            if v.x < 0.0 { -0.5 } else { 0.5 },
            if v.y < 0.0 { -0.5 } else { 0.5 },
            if v.z < 0.0 { -0.5 } else { 0.5 },
        );

        match num_zero {
            0 => Ok(SupportFeature::Vertex(self.to_world_point(body, signed))),
            1 => {
                let mut p1 = signed;
                let mut p2 = signed;
                p1[zero_axes[0]] = 0.5;
                p2[zero_axes[0]] = -0.5;
                Ok(SupportFeature::Edge([
                    self.to_world_point(body, p1),
                    self.to_world_point(body, p2),
                ]))
            }
            2 => {
                let mut ps = [signed; 4];
                // counter-clockwise winding with respect to the nonzero axis
                let quad: [[f64; 2]; 4] = [[0.5, 0.5], [-0.5, 0.5], [-0.5, -0.5], [0.5, -0.5]];
                let quad_reversed: [[f64; 2]; 4] =
                    [[0.5, 0.5], [0.5, -0.5], [-0.5, -0.5], [-0.5, 0.5]];
                let axis = nonzero_axes[0];
                let (a, b) = ((axis + 1) % 3, (axis + 2) % 3);
                let winding = if v[axis] > 0.0 { quad } else { quad_reversed };
                for (p, w) in ps.iter_mut().zip(winding) {
                    p[a] = w[0];
                    p[b] = w[1];
                }
                Ok(SupportFeature::Face(
                    ps.map(|p| self.to_world_point(body, p)),
                ))
            }
            _ => Err(DynamicsError::DegenerateSupportDirection),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn body_at(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> BodyState {
        let mut state = BodyState::new();
        state.position = position;
        state.orientation = orientation;
        state.update_transformations();
        state
    }

    fn corners(geometry: &BoxGeometry, body: &BodyState) -> Vec<Point3<f64>> {
        let mut out = Vec::new();
        for sx in [-0.5, 0.5] {
            for sy in [-0.5, 0.5] {
                for sz in [-0.5, 0.5] {
                    out.push(geometry.to_world_point(body, Vector3::new(sx, sy, sz)));
                }
            }
        }
        out
    }

    #[test]
    fn test_inertia_matrix_analytic() {
        let geometry = BoxGeometry::new(2.0, 3.0, 4.0);
        let m = 2.0 * 3.0 * 4.0;
        let inertia = geometry.inertia_matrix();
        assert_relative_eq!(inertia[(0, 0)], m * (9.0 + 16.0) / 12.0, epsilon = 1e-12);
        assert_relative_eq!(inertia[(1, 1)], m * (4.0 + 16.0) / 12.0, epsilon = 1e-12);
        assert_relative_eq!(inertia[(2, 2)], m * (4.0 + 9.0) / 12.0, epsilon = 1e-12);
        assert_relative_eq!(inertia[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_support_point_is_extremal_corner() {
        let geometry = BoxGeometry::new(1.0, 2.0, 0.5);
        let body = body_at(
            Point3::new(1.0, -2.0, 0.3),
            UnitQuaternion::from_euler_angles(0.4, -1.1, 0.9),
        );
        let all = corners(&geometry, &body);

        let directions = [
            Vector3::new(1.0, 0.3, -0.2),
            Vector3::new(-1.0, 2.0, 0.5),
            Vector3::new(0.01, -1.0, 3.0),
            Vector3::new(-0.7, -0.7, -0.7),
            Vector3::new(2.0, 0.0, 0.1),
        ];
        for d in directions {
            let s = geometry.support_point(&body, &d);

            // the result is one of the 8 corners
            assert!(all
                .iter()
                .any(|c| (c - s).norm() < 1e-9), "support must be a corner");

            // true support property against every corner
            for c in &all {
                assert!(d.dot(&(s - body.position)) >= d.dot(&(c - body.position)) - 1e-9);
            }
        }
    }

    #[test]
    fn test_support_feature_vertex_edge_face() {
        let geometry = BoxGeometry::new(1.0, 1.0, 1.0);
        let body = body_at(Point3::origin(), UnitQuaternion::identity());

        let vertex = geometry
            .support_feature(&body, &Vector3::new(1.0, 1.0, 1.0))
            .unwrap();
        assert_eq!(vertex.len(), 1);

        let edge = geometry
            .support_feature(&body, &Vector3::new(1.0, 1.0, 0.0))
            .unwrap();
        assert_eq!(edge.len(), 2);

        let face = geometry
            .support_feature(&body, &Vector3::new(0.0, 0.0, 1.0))
            .unwrap();
        assert_eq!(face.len(), 4);
    }

    #[test]
    fn test_face_winding_is_counter_clockwise() {
        let geometry = BoxGeometry::new(1.0, 1.0, 1.0);
        let body = body_at(Point3::origin(), UnitQuaternion::identity());

        for (direction, outward) in [
            (Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, 1.0)),
            (Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.0, 0.0, -1.0)),
            (Vector3::new(1.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)),
            (Vector3::new(0.0, -1.0, 0.0), Vector3::new(0.0, -1.0, 0.0)),
        ] {
            let feature = geometry.support_feature(&body, &direction).unwrap();
            let SupportFeature::Face(ps) = feature else {
                panic!("expected a face");
            };
            // polygon normal from the first three points must match the
            // outward direction for a CCW winding
            let normal = (ps[1] - ps[0]).cross(&(ps[2] - ps[1]));
            assert!(normal.dot(&outward) > 0.0, "winding flipped for {direction:?}");
        }
    }

    #[test]
    fn test_degenerate_direction_fails_fast() {
        let geometry = BoxGeometry::new(1.0, 1.0, 1.0);
        let body = body_at(Point3::origin(), UnitQuaternion::identity());
        let err = geometry
            .support_feature(&body, &Vector3::new(0.01, 0.01, 0.01))
            .unwrap_err();
        assert_eq!(err, DynamicsError::DegenerateSupportDirection);
    }

    #[test]
    fn test_bounds_contain_all_corners() {
        let geometry = BoxGeometry::with_displacement(1.5, 0.8, 2.2, Vector3::new(0.3, 0.0, -0.1));
        let body = body_at(
            Point3::new(5.0, 1.0, -2.0),
            UnitQuaternion::from_euler_angles(0.7, 0.2, -0.5),
        );

        let max = geometry.max_bounds(&body);
        let min = geometry.min_bounds(&body);
        for c in corners(&geometry, &body) {
            for i in 0..3 {
                assert!(c[i] <= max[i] + 1e-9);
                assert!(c[i] >= min[i] - 1e-9);
            }
        }

        // envelope expands the bounds beyond the tight extents
        assert!(max.x - min.x >= 2.0 * geometry.envelope());
    }

    #[test]
    fn test_world_transform_places_canonical_corners() {
        let geometry = BoxGeometry::with_displacement(2.0, 4.0, 6.0, Vector3::new(1.0, 0.0, 0.0));
        let body = body_at(
            Point3::new(0.0, 0.0, 5.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
        );

        let transform = geometry.world_transform(&body);
        // scaled corner (1, 2, 3) + displacement, rotated 90° about z,
        // translated to the body position
        let mapped = transform.transform_point(&Point3::new(0.5, 0.5, 0.5));
        assert_relative_eq!(
            mapped.coords,
            Vector3::new(-2.0, 2.0, 8.0),
            epsilon = 1e-12
        );

        // every canonical corner lands where the body/geometry frames say
        for sx in [-0.5, 0.5] {
            for sy in [-0.5, 0.5] {
                for sz in [-0.5, 0.5] {
                    let canonical = Vector3::new(sx, sy, sz);
                    let expected = geometry.to_world_point(&body, canonical);
                    let got = transform.transform_point(&Point3::from(canonical));
                    assert_relative_eq!(got.coords, expected.coords, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_set_side_lengths_updates_mass_and_transform() {
        let mut geometry = BoxGeometry::new(1.0, 1.0, 1.0);
        geometry.set_side_lengths(2.0, 2.0, 2.0);
        assert_relative_eq!(geometry.mass(), 8.0, epsilon = 1e-12);

        let body = body_at(Point3::origin(), UnitQuaternion::identity());
        let s = geometry.support_point(&body, &Vector3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(s.coords, Vector3::new(1.0, 1.0, 1.0), epsilon = 1e-12);
    }
}
