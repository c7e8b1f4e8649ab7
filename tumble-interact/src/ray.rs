//! Ray queries against body geometry.

use nalgebra::{Matrix3, Point3, Vector3};
use tumble_geometry::BoxGeometry;
use tumble_types::BodyState;

/// A ray in world space. The direction need not be normalized; hit
/// parameters are expressed in units of its length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin.
    pub origin: Point3<f64>,
    /// Ray direction.
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Create a ray.
    #[must_use]
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }

    /// The point at parameter `t`.
    #[must_use]
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }
}

/// A ray intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the entry point, never negative.
    pub parameter: f64,
    /// Entry point in world space.
    pub point: Point3<f64>,
}

/// Casts rays against a geometry in a given body pose.
///
/// This is the picking seam of the interaction controller: renderers with
/// their own acceleration structures can substitute their caster.
pub trait RayCaster {
    /// Intersect `ray` with `geometry` posed by `state`. Returns the nearest
    /// non-negative hit, or `None` if the ray misses.
    fn cast(&self, geometry: &BoxGeometry, state: &BodyState, ray: &Ray) -> Option<RayHit>;
}

/// Exact slab-method raycaster for boxes.
///
/// The ray is mapped into the box's canonical unit frame, intersected with
/// the three axis slabs, and the entry parameter mapped back. Rays starting
/// inside the box hit at parameter zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxRayCaster;

impl RayCaster for BoxRayCaster {
    fn cast(&self, geometry: &BoxGeometry, state: &BodyState, ray: &Ray) -> Option<RayHit> {
        // world -> canonical box frame, where the box is [-1/2, 1/2]^3
        let sides = geometry.side_lengths();
        let inverse_scale = Matrix3::from_diagonal(&Vector3::new(
            1.0 / sides.x,
            1.0 / sides.y,
            1.0 / sides.z,
        ));
        let unscale = inverse_scale * geometry.local_rotation().transpose();
        let origin = unscale
            * (state.inverse_rotation * (ray.origin - state.position)
                - geometry.local_displacement());
        let direction = unscale * (state.inverse_rotation * ray.direction);

        let mut t_enter = f64::NEG_INFINITY;
        let mut t_exit = f64::INFINITY;
        for axis in 0..3 {
            if direction[axis].abs() < 1e-14 {
                if origin[axis].abs() > 0.5 {
                    return None;
                }
                continue;
            }
            let t1 = (-0.5 - origin[axis]) / direction[axis];
            let t2 = (0.5 - origin[axis]) / direction[axis];
            t_enter = t_enter.max(t1.min(t2));
            t_exit = t_exit.min(t1.max(t2));
        }

        if t_exit < t_enter.max(0.0) {
            return None;
        }
        let parameter = t_enter.max(0.0);
        Some(RayHit {
            parameter,
            point: ray.at(parameter),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn posed(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> BodyState {
        let mut state = BodyState::new();
        state.position = position;
        state.orientation = orientation;
        state.update_transformations();
        state
    }

    #[test]
    fn test_axis_aligned_hit_and_miss() {
        let geometry = BoxGeometry::new(1.0, 1.0, 1.0);
        let state = posed(Point3::new(0.0, 0.0, -5.0), UnitQuaternion::identity());
        let caster = BoxRayCaster;

        let hit = caster
            .cast(
                &geometry,
                &state,
                &Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, -1.0)),
            )
            .unwrap();
        assert_relative_eq!(hit.parameter, 4.5, epsilon = 1e-12);
        assert_relative_eq!(hit.point.z, -4.5, epsilon = 1e-12);

        let miss = caster.cast(
            &geometry,
            &state,
            &Ray::new(Point3::new(2.0, 0.0, 0.0), Vector3::new(0.0, 0.0, -1.0)),
        );
        assert!(miss.is_none());
    }

    #[test]
    fn test_hit_behind_origin_is_a_miss() {
        let geometry = BoxGeometry::new(1.0, 1.0, 1.0);
        let state = posed(Point3::new(0.0, 0.0, 5.0), UnitQuaternion::identity());
        let caster = BoxRayCaster;
        let miss = caster.cast(
            &geometry,
            &state,
            &Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, -1.0)),
        );
        assert!(miss.is_none());
    }

    #[test]
    fn test_ray_starting_inside_hits_at_zero() {
        let geometry = BoxGeometry::new(2.0, 2.0, 2.0);
        let state = posed(Point3::origin(), UnitQuaternion::identity());
        let caster = BoxRayCaster;
        let hit = caster
            .cast(
                &geometry,
                &state,
                &Ray::new(Point3::origin(), Vector3::new(1.0, 0.0, 0.0)),
            )
            .unwrap();
        assert_relative_eq!(hit.parameter, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_box_is_hit_on_its_diagonal() {
        let geometry = BoxGeometry::new(1.0, 1.0, 1.0);
        // 45 degrees around z: the corner now points along +x at ~0.707
        let state = posed(
            Point3::origin(),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_4),
        );
        let caster = BoxRayCaster;
        let hit = caster
            .cast(
                &geometry,
                &state,
                &Ray::new(Point3::new(5.0, 0.0, 0.0), Vector3::new(-1.0, 0.0, 0.0)),
            )
            .unwrap();
        let half_diagonal = std::f64::consts::SQRT_2 / 2.0;
        assert_relative_eq!(hit.point.x, half_diagonal, epsilon = 1e-9);

        // just past the corner the same ray misses
        let miss = caster.cast(
            &geometry,
            &state,
            &Ray::new(Point3::new(5.0, 0.8, 0.0), Vector3::new(-1.0, 0.0, 0.0)),
        );
        assert!(miss.is_none());
    }
}
