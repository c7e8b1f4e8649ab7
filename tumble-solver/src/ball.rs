//! Ball-in-socket joint between two bodies.

use nalgebra::{Point3, Vector3};
use tumble_dynamics::BodySet;
use tumble_types::{BodyId, DynamicsError, Result};

use crate::constraint::NcpConstraint;

/// Position error correction clamp, in units of velocity. Large placement
/// errors are recovered over several steps instead of one violent snap.
const CORRECTION_LIMIT: f64 = 7.0;

/// Fraction of the position error corrected per step.
const CORRECTION_FACTOR: f64 = 0.8;

/// Pins a point of one body to a point of another.
///
/// The joint removes the three relative translational degrees of freedom at
/// the shared anchor. Each step it emits three bilateral rows, one per world
/// axis, whose bias blends the current relative anchor velocity with a
/// clamped position-error correction. An optional force limit bounds the
/// multipliers, which turns the joint into a breakable, soft attachment:
/// interaction controllers use this so a dragged body cannot receive
/// unbounded force.
///
/// Multipliers are stored back after each solve and warm-start the next one.
#[derive(Debug, Clone)]
pub struct BallJoint {
    body1: BodyId,
    body2: BodyId,
    anchor1: Vector3<f64>,
    anchor2: Vector3<f64>,
    force_limit: f64,
    lambda: [f64; 3],
}

impl BallJoint {
    /// Create a joint pinning both bodies at `world_anchor`.
    ///
    /// The anchor is recorded in each body's local frame, so it follows the
    /// bodies as they move.
    pub fn new(
        bodies: &BodySet,
        body1: BodyId,
        body2: BodyId,
        world_anchor: Point3<f64>,
    ) -> Result<Self> {
        let first = bodies.get(body1).ok_or(DynamicsError::InvalidBodyId(body1))?;
        let second = bodies.get(body2).ok_or(DynamicsError::InvalidBodyId(body2))?;
        Ok(Self {
            body1,
            body2,
            anchor1: first.state.to_model(&world_anchor).coords,
            anchor2: second.state.to_model(&world_anchor).coords,
            force_limit: f64::INFINITY,
            lambda: [0.0; 3],
        })
    }

    /// The first jointed body.
    #[must_use]
    pub fn body1(&self) -> BodyId {
        self.body1
    }

    /// The second jointed body.
    #[must_use]
    pub fn body2(&self) -> BodyId {
        self.body2
    }

    /// Bound the joint force magnitude per axis.
    pub fn set_force_limit(&mut self, limit: f64) {
        self.force_limit = limit;
    }

    /// The current per-axis force limit.
    #[must_use]
    pub fn force_limit(&self) -> f64 {
        self.force_limit
    }

    /// Emit the joint's three rows for this step into `out`.
    ///
    /// Rows reference bodies by their current slot and are already
    /// preconditioned.
    pub fn build_rows(
        &self,
        bodies: &BodySet,
        dt: f64,
        out: &mut Vec<NcpConstraint>,
    ) -> Result<()> {
        let slot1 = bodies
            .slot_of(self.body1)
            .ok_or(DynamicsError::InvalidBodyId(self.body1))?;
        let slot2 = bodies
            .slot_of(self.body2)
            .ok_or(DynamicsError::InvalidBodyId(self.body2))?;
        let first = &bodies.as_slice()[slot1];
        let second = &bodies.as_slice()[slot2];

        let r1 = first.state.rotation * self.anchor1;
        let r2 = second.state.rotation * self.anchor2;
        let error = (first.state.position + r1) - (second.state.position + r2);
        let u = (first.state.velocity + first.state.angular_velocity.cross(&r1))
            - (second.state.velocity + second.state.angular_velocity.cross(&r2));

        let bound = self.force_limit * dt;
        for (k, axis) in [Vector3::x(), Vector3::y(), Vector3::z()].into_iter().enumerate() {
            let mut row = NcpConstraint::new(slot1, slot2);
            row.j1 = axis;
            row.j2 = r1.cross(&axis);
            row.j3 = -axis;
            row.j4 = -(r2.cross(&axis));

            let correction = (error.dot(&axis) * CORRECTION_FACTOR / dt)
                .clamp(-CORRECTION_LIMIT, CORRECTION_LIMIT);
            row.b = u.dot(&axis) + correction;
            row.lower = -bound;
            row.upper = bound;
            row.lambda = self.lambda[k];
            row.precondition(bodies.as_slice());
            out.push(row);
        }
        Ok(())
    }

    /// Store the solved multipliers of this joint's three rows, in the order
    /// [`Self::build_rows`] produced them, for warm starting.
    pub fn store_multipliers(&mut self, rows: &[NcpConstraint]) {
        for (slot, row) in self.lambda.iter_mut().zip(rows) {
            *slot = row.lambda;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::solver::NonsmoothCg;
    use approx::assert_relative_eq;
    use tumble_dynamics::RigidBody;
    use tumble_geometry::BoxGeometry;
    use tumble_types::SolverConfig;

    fn two_bodies() -> (BodySet, BodyId, BodyId) {
        let mut set = BodySet::new();
        let a = set.allocate_id();
        set.insert(RigidBody::with_geometry(a, BoxGeometry::new(1.0, 1.0, 1.0)).unwrap())
            .unwrap();
        let b = set.allocate_id();
        let mut second =
            RigidBody::with_geometry(b, BoxGeometry::new(1.0, 1.0, 1.0)).unwrap();
        second.state.position = Point3::new(1.0, 0.0, 0.0);
        second.state.update_transformations();
        set.insert(second).unwrap();
        (set, a, b)
    }

    #[test]
    fn test_anchor_recorded_in_both_local_frames() {
        let (set, a, b) = two_bodies();
        let joint = BallJoint::new(&set, a, b, Point3::new(0.5, 0.0, 0.0)).unwrap();
        assert_relative_eq!(joint.anchor1, Vector3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(joint.anchor2, Vector3::new(-0.5, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_body_is_rejected() {
        let (set, a, _) = two_bodies();
        let missing = BodyId::new(99);
        let err = BallJoint::new(&set, a, missing, Point3::origin()).unwrap_err();
        assert_eq!(err, DynamicsError::InvalidBodyId(missing));
    }

    #[test]
    fn test_joint_cancels_relative_anchor_velocity() {
        let (mut set, a, b) = two_bodies();
        set.get_mut(a).unwrap().state.velocity = Vector3::new(0.0, 2.0, 0.0);

        let joint = BallJoint::new(&set, a, b, Point3::new(0.5, 0.0, 0.0)).unwrap();
        let mut rows = Vec::new();
        joint.build_rows(&set, 0.01, &mut rows).unwrap();
        assert_eq!(rows.len(), 3);

        let solver = NonsmoothCg::new(SolverConfig::default()).unwrap();
        let stats = solver.solve(&mut rows, set.as_mut_slice());
        assert!(stats.converged);

        // relative velocity at the anchor after the solve
        let bodies = set.as_slice();
        let r1 = Vector3::new(0.5, 0.0, 0.0);
        let r2 = Vector3::new(-0.5, 0.0, 0.0);
        let v1 = bodies[0].state.velocity + bodies[0].delta_velocity
            + (bodies[0].state.angular_velocity + bodies[0].delta_omega).cross(&r1);
        let v2 = bodies[1].state.velocity + bodies[1].delta_velocity
            + (bodies[1].state.angular_velocity + bodies[1].delta_omega).cross(&r2);
        assert_relative_eq!(v1, v2, epsilon = 1e-4);
    }

    #[test]
    fn test_position_error_correction_is_clamped() {
        let (mut set, a, b) = two_bodies();
        // tear the joint far apart
        set.get_mut(b).unwrap().state.position = Point3::new(100.0, 0.0, 0.0);
        set.get_mut(b).unwrap().state.update_transformations();

        let joint = {
            let mut set_at_origin = BodySet::new();
            set_at_origin
                .insert(set.get(a).unwrap().clone())
                .unwrap();
            let mut near = set.get(b).unwrap().clone();
            near.state.position = Point3::new(1.0, 0.0, 0.0);
            near.state.update_transformations();
            set_at_origin.insert(near).unwrap();
            BallJoint::new(&set_at_origin, a, b, Point3::new(0.5, 0.0, 0.0)).unwrap()
        };

        let mut rows = Vec::new();
        joint.build_rows(&set, 0.01, &mut rows).unwrap();
        // raw correction would be 99 * 0.8 / 0.01; the clamp holds it at 7
        assert_relative_eq!(rows[0].b, -7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_force_limit_bounds_rows() {
        let (set, a, b) = two_bodies();
        let mut joint = BallJoint::new(&set, a, b, Point3::new(0.5, 0.0, 0.0)).unwrap();
        joint.set_force_limit(10.0);

        let mut rows = Vec::new();
        joint.build_rows(&set, 0.5, &mut rows).unwrap();
        for row in &rows {
            assert_relative_eq!(row.lower, -5.0, epsilon = 1e-12);
            assert_relative_eq!(row.upper, 5.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_multipliers_warm_start_next_build() {
        let (mut set, a, b) = two_bodies();
        set.get_mut(a).unwrap().state.velocity = Vector3::new(0.0, 2.0, 0.0);

        let mut joint = BallJoint::new(&set, a, b, Point3::new(0.5, 0.0, 0.0)).unwrap();
        let mut rows = Vec::new();
        joint.build_rows(&set, 0.01, &mut rows).unwrap();
        let solver = NonsmoothCg::new(SolverConfig::default()).unwrap();
        solver.solve(&mut rows, set.as_mut_slice());
        joint.store_multipliers(&rows);

        let mut rows2 = Vec::new();
        joint.build_rows(&set, 0.01, &mut rows2).unwrap();
        assert_relative_eq!(rows2[1].lambda, rows[1].lambda, epsilon = 1e-12);
    }
}
