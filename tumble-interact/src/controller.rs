//! Mouse-style grabbing of simulated bodies.

use std::sync::MutexGuard;

use nalgebra::{Matrix3, Point3, Vector3};
use tracing::debug;
use tumble_dynamics::RigidBody;
use tumble_solver::BallJoint;
use tumble_types::{BodyId, DynamicsError, JointId, Result};

use crate::ray::{Ray, RayCaster};
use crate::scene::{Scene, SharedScene};

/// How much stronger than the body's own weight-scale the grab force may be.
const FORCE_LIMIT_FACTOR: f64 = 1.5;

struct Grab {
    target: BodyId,
    joint: JointId,
    controller: BodyId,
    saved_inertia: Matrix3<f64>,
    saved_inverse_inertia: Matrix3<f64>,
}

/// Grabs, drags, and releases bodies through a shared scene.
///
/// A press casts a pick ray; the nearest non-fixed body under it is pinned
/// at the hit point to an invisible fixed controller body by a
/// force-limited ball joint. Subsequent drags intersect the pointer ray
/// with a movement plane through the grab point and teleport the controller
/// body there; the joint then pulls the target after it with bounded force,
/// so a grabbed body still pushes off other bodies instead of tunneling.
///
/// While grabbed, the target's inverse inertia is zeroed so it translates
/// without spinning around the grip; the original tensors are restored
/// bit-for-bit on release. The movement plane defaults to horizontal and
/// can be toggled to vertical mid-drag.
pub struct InteractionController<S: Scene, C: RayCaster> {
    scene: SharedScene<S>,
    caster: C,
    grab: Option<Grab>,
    pick_point: Point3<f64>,
    plane_normal: Vector3<f64>,
}

impl<S: Scene, C: RayCaster> InteractionController<S, C> {
    /// Create a controller over a shared scene.
    #[must_use]
    pub fn new(scene: SharedScene<S>, caster: C) -> Self {
        Self {
            scene,
            caster,
            grab: None,
            pick_point: Point3::origin(),
            plane_normal: Vector3::y(),
        }
    }

    /// Whether a body is currently grabbed.
    #[must_use]
    pub fn is_grabbing(&self) -> bool {
        self.grab.is_some()
    }

    /// The grabbed body, if any.
    #[must_use]
    pub fn grabbed_body(&self) -> Option<BodyId> {
        self.grab.as_ref().map(|grab| grab.target)
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.scene
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Try to grab the nearest non-fixed body under `ray`.
    ///
    /// Returns `Ok(true)` if a body was grabbed. Pressing while already
    /// grabbing is a no-op.
    pub fn press(&mut self, ray: &Ray) -> Result<bool> {
        if self.grab.is_some() {
            return Ok(false);
        }

        let mut scene = self.lock();

        let mut nearest: Option<(BodyId, f64, Point3<f64>)> = None;
        for body in scene.bodies().iter() {
            if body.is_fixed() {
                continue;
            }
            let Some(geometry) = body.geometries().first() else {
                continue;
            };
            if let Some(hit) = self.caster.cast(geometry, &body.state, ray) {
                let closer = nearest
                    .map(|(_, best, _)| hit.parameter < best)
                    .unwrap_or(true);
                if closer {
                    nearest = Some((body.id(), hit.parameter, hit.point));
                }
            }
        }
        let Some((target, _, hit_point)) = nearest else {
            return Ok(false);
        };
        debug!(body = %target, "grabbing body");

        scene.wake(target)?;
        let target_mass;
        let saved_inertia;
        let saved_inverse_inertia;
        {
            let body = scene
                .bodies_mut()
                .get_mut(target)
                .ok_or(DynamicsError::InvalidBodyId(target))?;
            body.state.velocity = Vector3::zeros();
            body.state.angular_velocity = Vector3::zeros();
            target_mass = body.mass();
            saved_inertia = body.state.inertia;
            saved_inverse_inertia = body.state.inverse_inertia;
            body.state.inverse_inertia = Matrix3::zeros();
        }

        let controller_id = scene.bodies_mut().allocate_id();
        let mut controller = RigidBody::new(controller_id);
        controller.set_fixed(true);
        controller.state.position = hit_point;
        controller.state.update_transformations();
        scene.add_body(controller)?;

        let mut joint = BallJoint::new(scene.bodies(), target, controller_id, hit_point)?;
        joint.set_force_limit(target_mass * FORCE_LIMIT_FACTOR);
        let joint_id = scene.add_joint(joint);
        scene.set_joint_live(joint_id, true)?;
        drop(scene);

        self.pick_point = hit_point;
        self.grab = Some(Grab {
            target,
            joint: joint_id,
            controller: controller_id,
            saved_inertia,
            saved_inverse_inertia,
        });
        Ok(true)
    }

    /// Move the grab target to where `ray` crosses the movement plane.
    ///
    /// Does nothing when not grabbing or when the ray runs parallel to the
    /// plane.
    pub fn drag(&mut self, ray: &Ray) -> Result<()> {
        let Some(grab) = &self.grab else {
            return Ok(());
        };

        let denominator = self.plane_normal.dot(&ray.direction);
        if denominator.abs() < 1e-12 {
            return Ok(());
        }
        let t = self.plane_normal.dot(&(self.pick_point - ray.origin)) / denominator;
        let point = ray.at(t);

        let mut scene = self.lock();
        scene.wake(grab.target)?;
        let controller = scene
            .bodies_mut()
            .get_mut(grab.controller)
            .ok_or(DynamicsError::InvalidBodyId(grab.controller))?;
        controller.state.position = point;
        controller.state.update_transformations();
        Ok(())
    }

    /// Drop the grabbed body, restoring its inertia tensors exactly.
    ///
    /// A release without a grab is a no-op.
    pub fn release(&mut self) -> Result<()> {
        let Some(grab) = self.grab.take() else {
            return Ok(());
        };
        debug!(body = %grab.target, "releasing body");

        let mut scene = self.lock();
        scene.set_joint_live(grab.joint, false)?;
        scene.remove_joint(grab.joint)?;
        scene.remove_body(grab.controller)?;

        let body = scene
            .bodies_mut()
            .get_mut(grab.target)
            .ok_or(DynamicsError::InvalidBodyId(grab.target))?;
        body.state.inertia = grab.saved_inertia;
        body.state.inverse_inertia = grab.saved_inverse_inertia;
        Ok(())
    }

    /// Switch dragging to the vertical plane, re-anchored at the current
    /// grab position.
    pub fn engage_alternate_plane(&mut self) -> Result<()> {
        self.plane_normal = Vector3::z();
        self.reanchor()
    }

    /// Switch dragging back to the horizontal plane, re-anchored at the
    /// current grab position.
    pub fn release_alternate_plane(&mut self) -> Result<()> {
        self.plane_normal = Vector3::y();
        self.reanchor()
    }

    fn reanchor(&mut self) -> Result<()> {
        let Some(grab) = &self.grab else {
            return Ok(());
        };
        let scene = self.lock();
        let controller = scene
            .bodies()
            .get(grab.controller)
            .ok_or(DynamicsError::InvalidBodyId(grab.controller))?;
        let position = controller.state.position;
        drop(scene);
        self.pick_point = position;
        Ok(())
    }
}
