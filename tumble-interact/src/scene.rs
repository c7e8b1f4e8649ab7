//! Scene trait and the bundled fixed-step implementation.

use std::sync::{Arc, Mutex};

use nalgebra::Vector3;
use tracing::debug;
use tumble_dynamics::{BodySet, DeactivationPolicy, RigidBody};
use tumble_solver::{BallJoint, NcpConstraint, NonsmoothCg, SolverStats};
use tumble_types::{
    BodyId, DeactivationConfig, DynamicsError, JointId, Result, SolverConfig,
};

/// A scene shared between the simulation thread and input threads.
///
/// The lock is coarse: every operation takes the whole scene. Input
/// handlers hold it for single operations, the stepping thread for one tick
/// at a time, which is the granularity interactive use needs.
pub type SharedScene<S> = Arc<Mutex<S>>;

/// A simulated collection of bodies and joints.
///
/// Joints carry a liveness flag so controllers can stage a joint and only
/// let it act once everything around it is set up. Live joints also pin
/// their bodies awake, so a held body never falls asleep mid-grab.
pub trait Scene {
    /// The bodies of the scene.
    fn bodies(&self) -> &BodySet;

    /// The bodies of the scene, mutably.
    fn bodies_mut(&mut self) -> &mut BodySet;

    /// Add a body. Its ID must come from this scene's body set.
    fn add_body(&mut self, body: RigidBody) -> Result<()>;

    /// Remove a body. Joints referencing it must be removed first.
    fn remove_body(&mut self, id: BodyId) -> Result<RigidBody>;

    /// Add a joint in the non-live state.
    fn add_joint(&mut self, joint: BallJoint) -> JointId;

    /// Remove a joint.
    fn remove_joint(&mut self, id: JointId) -> Result<BallJoint>;

    /// Enable or disable a joint.
    fn set_joint_live(&mut self, id: JointId, live: bool) -> Result<()>;

    /// Wake a body, bypassing the deactivation energy check once.
    fn wake(&mut self, id: BodyId) -> Result<()>;
}

/// Per-step outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepStats {
    /// Solver outcome for the assembled rows.
    pub solver: SolverStats,
    /// Bodies that went to sleep this step.
    pub deactivated: usize,
    /// Bodies that woke up this step.
    pub activated: usize,
}

struct JointEntry {
    id: JointId,
    joint: BallJoint,
    live: bool,
}

/// Fixed-step scene combining the body set, the NCP solver, and the
/// deactivation policy.
///
/// Each step: accumulate gravity into the external delta channels, assemble
/// rows from live joints, solve, run the sleep/wake pass, then integrate
/// awake bodies and merge all pending velocity changes. Sleeping and fixed
/// bodies are not integrated, so a sleeping body is bit-for-bit stationary.
pub struct BasicScene {
    bodies: BodySet,
    joints: Vec<JointEntry>,
    next_joint_id: u64,
    solver: NonsmoothCg,
    policy: DeactivationPolicy,
    gravity: Vector3<f64>,
}

impl BasicScene {
    /// Create an empty scene. Gravity defaults to off.
    pub fn new(solver: SolverConfig, deactivation: DeactivationConfig) -> Result<Self> {
        deactivation.validate()?;
        Ok(Self {
            bodies: BodySet::new(),
            joints: Vec::new(),
            next_joint_id: 0,
            solver: NonsmoothCg::new(solver)?,
            policy: DeactivationPolicy::new(deactivation),
            gravity: Vector3::zeros(),
        })
    }

    /// Set the gravitational acceleration applied to every non-fixed body.
    pub fn set_gravity(&mut self, gravity: Vector3<f64>) {
        self.gravity = gravity;
    }

    /// The deactivation policy.
    #[must_use]
    pub fn deactivation_policy(&self) -> &DeactivationPolicy {
        &self.policy
    }

    /// Advance the scene by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> Result<StepStats> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(DynamicsError::InvalidTimestep(dt));
        }

        for body in self.bodies.iter_mut() {
            body.clear_internal_deltas();
            if !body.is_fixed() && !body.is_deactivated() && self.gravity != Vector3::zeros() {
                let force = self.gravity * body.mass();
                body.apply_generalized_force(&force, &Vector3::zeros(), dt);
            }
        }

        // assemble rows from live joints, remembering each joint's slice
        let mut rows: Vec<NcpConstraint> = Vec::new();
        let mut spans: Vec<(usize, usize)> = Vec::new();
        for entry in &self.joints {
            if !entry.live {
                continue;
            }
            let start = rows.len();
            entry.joint.build_rows(&self.bodies, dt, &mut rows)?;
            spans.push((start, rows.len()));
        }

        let stats = self.solver.solve(&mut rows, self.bodies.as_mut_slice());

        let mut span_iter = spans.into_iter();
        for entry in self.joints.iter_mut().filter(|entry| entry.live) {
            if let Some((start, end)) = span_iter.next() {
                entry.joint.store_multipliers(&rows[start..end]);
            }
        }

        // bodies in live joints are pinned awake: a grabbed body must keep
        // responding even when held perfectly still
        let held: Vec<BodyId> = self
            .joints
            .iter()
            .filter(|entry| entry.live)
            .flat_map(|entry| [entry.joint.body1(), entry.joint.body2()])
            .collect();

        let mut activated = 0usize;
        let mut deactivated = 0usize;
        for body in self.bodies.iter_mut() {
            if held.contains(&body.id()) {
                if body.is_deactivated() {
                    self.policy.activate(body);
                    activated += 1;
                }
                continue;
            }
            if self.policy.should_activate(body) {
                self.policy.activate(body);
                activated += 1;
            } else if self.policy.should_deactivate(body) {
                self.policy.deactivate(body);
                deactivated += 1;
            }
        }

        for body in self.bodies.iter_mut() {
            if !body.is_fixed() && !body.is_deactivated() {
                body.state.velocity += body.delta_velocity + body.external_delta_velocity;
                body.state.angular_velocity += body.delta_omega + body.external_delta_omega;
                body.advance_positions(dt);
            }
            body.clear_internal_deltas();
            body.clear_external_deltas();
            if !body.is_finite() {
                return Err(DynamicsError::diverged(format!(
                    "body {} has non-finite state",
                    body.id()
                )));
            }
        }

        Ok(StepStats {
            solver: stats,
            deactivated,
            activated,
        })
    }
}

impl Scene for BasicScene {
    fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    fn bodies_mut(&mut self) -> &mut BodySet {
        &mut self.bodies
    }

    fn add_body(&mut self, body: RigidBody) -> Result<()> {
        debug!(body = %body.id(), "adding body");
        self.bodies.insert(body)
    }

    fn remove_body(&mut self, id: BodyId) -> Result<RigidBody> {
        if self
            .joints
            .iter()
            .any(|entry| entry.joint.body1() == id || entry.joint.body2() == id)
        {
            return Err(DynamicsError::invalid_config(format!(
                "body {id} still has joints attached"
            )));
        }
        self.bodies.remove(id)
    }

    fn add_joint(&mut self, joint: BallJoint) -> JointId {
        let id = JointId::new(self.next_joint_id);
        self.next_joint_id += 1;
        self.joints.push(JointEntry {
            id,
            joint,
            live: false,
        });
        id
    }

    fn remove_joint(&mut self, id: JointId) -> Result<BallJoint> {
        let position = self
            .joints
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(DynamicsError::InvalidJointId(id))?;
        Ok(self.joints.remove(position).joint)
    }

    fn set_joint_live(&mut self, id: JointId, live: bool) -> Result<()> {
        let entry = self
            .joints
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(DynamicsError::InvalidJointId(id))?;
        entry.live = live;
        Ok(())
    }

    fn wake(&mut self, id: BodyId) -> Result<()> {
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(DynamicsError::InvalidBodyId(id))?;
        self.policy.force_activate(id);
        self.policy.activate(body);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use tumble_geometry::BoxGeometry;

    fn scene() -> BasicScene {
        BasicScene::new(SolverConfig::default(), DeactivationConfig::default()).unwrap()
    }

    fn add_cube(scene: &mut BasicScene, position: Point3<f64>) -> BodyId {
        let id = scene.bodies_mut().allocate_id();
        let mut body = RigidBody::with_geometry(id, BoxGeometry::new(1.0, 1.0, 1.0)).unwrap();
        body.state.position = position;
        body.state.update_transformations();
        scene.add_body(body).unwrap();
        id
    }

    #[test]
    fn test_invalid_timestep_is_rejected() {
        let mut scene = scene();
        assert!(scene.step(0.0).is_err());
        assert!(scene.step(-0.01).is_err());
        assert!(scene.step(f64::NAN).is_err());
    }

    #[test]
    fn test_resting_body_does_not_drift() {
        let mut scene = scene();
        let id = add_cube(&mut scene, Point3::new(1.0, 2.0, 3.0));
        let before = scene.bodies().get(id).unwrap().state.clone();

        for _ in 0..100 {
            scene.step(0.03).unwrap();
        }

        let after = &scene.bodies().get(id).unwrap().state;
        assert_eq!(after.position, before.position);
        assert_eq!(after.orientation, before.orientation);
    }

    #[test]
    fn test_gravity_free_fall() {
        let mut scene = scene();
        scene.set_gravity(Vector3::new(0.0, -10.0, 0.0));
        let id = add_cube(&mut scene, Point3::origin());
        // plenty of speed so deactivation stays out of the way
        scene.bodies_mut().get_mut(id).unwrap().state.velocity = Vector3::new(0.0, -1.0, 0.0);

        let dt = 0.01;
        for _ in 0..100 {
            scene.step(dt).unwrap();
        }
        let velocity = scene.bodies().get(id).unwrap().state.velocity.y;
        assert_relative_eq!(velocity, -1.0 - 10.0 * 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_slow_body_falls_asleep_and_stops() {
        let mut scene = scene();
        let id = add_cube(&mut scene, Point3::origin());
        scene.bodies_mut().get_mut(id).unwrap().state.velocity =
            Vector3::new(1e-3, 0.0, 0.0);

        let stats = scene.step(0.01).unwrap();
        assert_eq!(stats.deactivated, 1);
        let body = scene.bodies().get(id).unwrap();
        assert!(body.is_deactivated());
        assert_eq!(body.state.velocity, Vector3::zeros());

        let position = body.state.position;
        for _ in 0..10 {
            scene.step(0.01).unwrap();
        }
        assert_eq!(scene.bodies().get(id).unwrap().state.position, position);
    }

    #[test]
    fn test_wake_bypasses_energy_check_once() {
        let mut scene = scene();
        let id = add_cube(&mut scene, Point3::origin());
        scene.step(0.01).unwrap();
        assert!(scene.bodies().get(id).unwrap().is_deactivated());

        scene.wake(id).unwrap();
        assert!(!scene.bodies().get(id).unwrap().is_deactivated());
    }

    #[test]
    fn test_live_joint_holds_bodies_together() {
        let mut scene = scene();
        let anchor_body = add_cube(&mut scene, Point3::origin());
        scene
            .bodies_mut()
            .get_mut(anchor_body)
            .unwrap()
            .set_fixed(true);
        let hanging = add_cube(&mut scene, Point3::new(1.0, 0.0, 0.0));
        scene.bodies_mut().get_mut(hanging).unwrap().state.velocity =
            Vector3::new(5.0, 0.0, 0.0);

        let joint = BallJoint::new(
            scene.bodies(),
            anchor_body,
            hanging,
            Point3::new(0.5, 0.0, 0.0),
        )
        .unwrap();
        let joint_id = scene.add_joint(joint);

        // a staged joint does nothing until made live
        scene.step(0.01).unwrap();
        assert!(scene.bodies().get(hanging).unwrap().state.velocity.x > 4.9);

        scene.set_joint_live(joint_id, true).unwrap();
        for _ in 0..20 {
            scene.step(0.01).unwrap();
        }
        let body = scene.bodies().get(hanging).unwrap();
        assert!(
            body.state.velocity.norm() < 1.0,
            "joint failed to arrest the body: {:?}",
            body.state.velocity
        );
        // the anchor point stays near the fixed body
        let anchor_world = body.state.position + body.state.rotation * Vector3::new(-0.5, 0.0, 0.0);
        assert!((anchor_world - Point3::new(0.5, 0.0, 0.0)).norm() < 0.2);
    }

    #[test]
    fn test_remove_body_with_joint_is_rejected() {
        let mut scene = scene();
        let a = add_cube(&mut scene, Point3::origin());
        let b = add_cube(&mut scene, Point3::new(1.0, 0.0, 0.0));
        let joint = BallJoint::new(scene.bodies(), a, b, Point3::new(0.5, 0.0, 0.0)).unwrap();
        let joint_id = scene.add_joint(joint);

        assert!(scene.remove_body(a).is_err());
        scene.remove_joint(joint_id).unwrap();
        assert!(scene.remove_body(a).is_ok());
    }
}
