//! Rigid body with aggregated mass properties and delta-velocity channels.

use nalgebra::{Matrix3, Point3, Quaternion, UnitQuaternion, Vector3};
use tumble_geometry::BoxGeometry;
use tumble_types::{BodyId, BodyState, DynamicsError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rigid body: kinematic state plus the geometry it is built from.
///
/// Velocity changes accumulate in two separate channels until the end of a
/// simulation step. The `delta_*` fields are written by the constraint
/// solver; the `external_delta_*` fields collect applied forces such as
/// gravity and user interaction. Keeping them apart lets the solver
/// compensate for external influences and lets the deactivation policy
/// measure total incoming motion.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBody {
    id: BodyId,
    /// Kinematic and mass state.
    pub state: BodyState,
    geometries: Vec<BoxGeometry>,
    /// Velocity change produced by the constraint solver this step.
    pub delta_velocity: Vector3<f64>,
    /// Angular velocity change produced by the constraint solver this step.
    pub delta_omega: Vector3<f64>,
    /// Velocity change from applied external forces this step.
    pub external_delta_velocity: Vector3<f64>,
    /// Angular velocity change from applied external forces this step.
    pub external_delta_omega: Vector3<f64>,
    fixed: bool,
    deactivated: bool,
}

impl RigidBody {
    /// Create an empty body with unit mass properties.
    #[must_use]
    pub fn new(id: BodyId) -> Self {
        Self {
            id,
            state: BodyState::new(),
            geometries: Vec::new(),
            delta_velocity: Vector3::zeros(),
            delta_omega: Vector3::zeros(),
            external_delta_velocity: Vector3::zeros(),
            external_delta_omega: Vector3::zeros(),
            fixed: false,
            deactivated: false,
        }
    }

    /// Create a body from a single geometry and finalize it immediately.
    pub fn with_geometry(id: BodyId, geometry: BoxGeometry) -> Result<Self> {
        let mut body = Self::new(id);
        body.attach_geometry(geometry);
        body.finalize_mass()?;
        Ok(body)
    }

    /// The body's identifier.
    #[must_use]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Attach a geometry. [`Self::finalize_mass`] must be called before the
    /// body is simulated.
    pub fn attach_geometry(&mut self, geometry: BoxGeometry) {
        self.geometries.push(geometry);
    }

    /// The attached geometries.
    #[must_use]
    pub fn geometries(&self) -> &[BoxGeometry] {
        &self.geometries
    }

    /// Whether the body is immovable.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Mark the body as immovable. Fixed bodies ignore applied forces and
    /// contribute zero inverse mass to constraints.
    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    /// Whether the body is currently asleep.
    #[must_use]
    pub fn is_deactivated(&self) -> bool {
        self.deactivated
    }

    pub(crate) fn set_deactivated(&mut self, deactivated: bool) {
        self.deactivated = deactivated;
    }

    /// Aggregate mass, centre of mass, and inertia over all attached
    /// geometries.
    ///
    /// The centre of mass is the mass-weighted mean of the geometry
    /// displacements; each geometry's local frame is then re-expressed
    /// relative to it. Inertia contributions are rotated into the body frame
    /// and shifted with the parallel-axis theorem:
    ///
    /// `I_body = Σ rotate(Iᵢ, Rᵢ) + mᵢ ((rᵢ·rᵢ) 1 − rᵢ rᵢᵀ)`
    ///
    /// A total mass below `1e-14` is clamped to one so that empty or
    /// massless bodies still have invertible mass matrices; if the
    /// aggregate inertia tensor is singular it is replaced by the unit
    /// tensor. A body with no geometry gets unit mass and unit inertia.
    pub fn finalize_mass(&mut self) -> Result<()> {
        if self.geometries.is_empty() {
            self.state.set_uniform_mass(1.0);
            self.state.inertia = Matrix3::identity();
            self.state.inverse_inertia = Matrix3::identity();
            self.state.centre_of_mass = Vector3::zeros();
            return Ok(());
        }

        let mut total_mass = 0.0;
        let mut cm = Vector3::zeros();
        for geometry in &self.geometries {
            let m = geometry.mass();
            if !m.is_finite() || m < 0.0 {
                return Err(DynamicsError::invalid_mass(format!(
                    "geometry mass {m} is not a finite non-negative number"
                )));
            }
            total_mass += m;
            cm += geometry.local_displacement() * m;
        }
        if total_mass.abs() < 1e-14 {
            total_mass = 1.0;
        }
        cm /= total_mass;

        let mut inertia = Matrix3::zeros();
        for geometry in &mut self.geometries {
            let rotation = geometry.local_rotation();
            let displacement = geometry.local_displacement() - cm;
            geometry.set_local_transform(rotation, displacement);
            geometry.set_body(Some(self.id));

            let rotated = rotation * geometry.inertia_matrix() * rotation.transpose();
            let r = displacement;
            let shifted = rotated
                + geometry.mass()
                    * (Matrix3::identity() * r.dot(&r) - r * r.transpose());
            inertia += shifted;
        }

        self.state.set_uniform_mass(total_mass);
        // A singular aggregate (all geometries massless after the clamp)
        // falls back to unit inertia, same as the no-geometry branch.
        match inertia.try_inverse() {
            Some(inverse) => {
                self.state.inertia = inertia;
                self.state.inverse_inertia = inverse;
            }
            None => {
                self.state.inertia = Matrix3::identity();
                self.state.inverse_inertia = Matrix3::identity();
            }
        }
        self.state.centre_of_mass = cm;
        Ok(())
    }

    /// Scalar mass, measured as the response of the mass matrix along the
    /// space diagonal. For a uniform mass matrix this is exactly the mass.
    #[must_use]
    pub fn mass(&self) -> f64 {
        (self.state.mass * Vector3::repeat(1.0 / 3.0_f64.sqrt())).norm()
    }

    /// Move the body, refreshing the cached transforms.
    pub fn set_position(&mut self, position: Point3<f64>) {
        self.state.position = position;
        self.state.update_transformations();
    }

    /// Reorient the body, refreshing the cached transforms.
    pub fn set_orientation(&mut self, orientation: UnitQuaternion<f64>) {
        self.state.orientation = orientation;
        self.state.update_transformations();
    }

    /// Set the linear velocity.
    pub fn set_velocity(&mut self, velocity: Vector3<f64>) {
        self.state.velocity = velocity;
    }

    /// Set the angular velocity.
    pub fn set_angular_velocity(&mut self, angular_velocity: Vector3<f64>) {
        self.state.angular_velocity = angular_velocity;
    }

    /// Apply a force at a point for the duration `dt`.
    ///
    /// `point` is the application point relative to the centre of mass, in
    /// world orientation. The resulting velocity changes accumulate in the
    /// external delta channels; fixed bodies ignore forces entirely.
    pub fn apply_force(&mut self, point: &Vector3<f64>, force: &Vector3<f64>, dt: f64) {
        if self.fixed {
            return;
        }
        self.external_delta_velocity += self.state.inverse_mass * force * dt;
        self.external_delta_omega += self.state.inverse_inertia * point.cross(force) * dt;
    }

    /// Apply a central force and a torque for the duration `dt`.
    pub fn apply_generalized_force(
        &mut self,
        force: &Vector3<f64>,
        torque: &Vector3<f64>,
        dt: f64,
    ) {
        if self.fixed {
            return;
        }
        self.external_delta_velocity += self.state.inverse_mass * force * dt;
        self.external_delta_omega += self.state.inverse_inertia * torque * dt;
    }

    /// Integrate position and orientation forward by `dt` using the current
    /// velocities (explicit Euler).
    ///
    /// The orientation update uses the quaternion derivative
    /// `q̇ = ½ (0, ω) q` followed by renormalization, which keeps the
    /// quaternion on the unit sphere regardless of step size.
    pub fn advance_positions(&mut self, dt: f64) {
        self.state.position += self.state.velocity * dt;

        let omega = self.state.angular_velocity;
        let dq = Quaternion::from_parts(0.0, omega * 0.5);
        let q = self.state.orientation.into_inner();
        self.state.orientation = UnitQuaternion::new_normalize(q + dq * q * dt);

        self.state.update_transformations();
    }

    /// Total kinetic energy, `½ v·Mv + ½ ω·Iω`.
    #[must_use]
    pub fn total_kinetic(&self) -> f64 {
        let v = self.state.velocity;
        let w = self.state.angular_velocity;
        0.5 * v.dot(&(self.state.mass * v)) + 0.5 * w.dot(&(self.state.inertia * w))
    }

    /// Kinetic measure without mass weighting, `½(v·v + ω·ω)`. Used by the
    /// deactivation policy so that heavy and light bodies sleep at
    /// comparable speeds.
    #[must_use]
    pub fn total_scaled_kinetic(&self) -> f64 {
        let v = self.state.velocity;
        let w = self.state.angular_velocity;
        0.5 * (v.dot(&v) + w.dot(&w))
    }

    /// Zero the solver delta channels. Called at the start of a step.
    pub fn clear_internal_deltas(&mut self) {
        self.delta_velocity = Vector3::zeros();
        self.delta_omega = Vector3::zeros();
    }

    /// Zero the external delta channels. Called at the end of a step, after
    /// the accumulated changes have been merged into the velocities.
    pub fn clear_external_deltas(&mut self) {
        self.external_delta_velocity = Vector3::zeros();
        self.external_delta_omega = Vector3::zeros();
    }

    /// Check the whole body state for `NaN`/`Inf`.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.state.is_finite()
            && self.delta_velocity.iter().all(|x| x.is_finite())
            && self.delta_omega.iter().all(|x| x.is_finite())
            && self.external_delta_velocity.iter().all(|x| x.is_finite())
            && self.external_delta_omega.iter().all(|x| x.is_finite())
    }
}
