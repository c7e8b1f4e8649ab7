//! Body identifiers and the per-body kinematic/inertial state block.

use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a rigid body.
///
/// Identifiers are stable for the lifetime of a body and are never reused by
/// the body arena that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u64);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for BodyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Unique identifier for a joint registered with a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointId(pub u64);

impl JointId {
    /// Create a new joint ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Joint({})", self.0)
    }
}

/// Kinematic and inertial state of a rigid body.
///
/// The primary state is `(position, orientation, velocity, angular_velocity)`
/// plus the mass/inertia properties. The rotation matrix, its inverse and the
/// 4×4 world transform are caches derived from the primary state; they must
/// only ever be refreshed through [`BodyState::update_transformations`] and
/// never mutated independently.
///
/// The mass matrix is anisotropic (diagonal in the body frame) so that a
/// controller body can, for example, be made heavy along one axis only. For
/// ordinary bodies it is `m·I`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyState {
    /// Position of the centre of mass in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub orientation: UnitQuaternion<f64>,
    /// Linear velocity of the centre of mass (world frame).
    pub velocity: Vector3<f64>,
    /// Angular velocity (world frame).
    pub angular_velocity: Vector3<f64>,
    /// Cached rotation matrix, derived from `orientation`.
    pub rotation: Matrix3<f64>,
    /// Cached inverse rotation matrix (transpose of `rotation`).
    pub inverse_rotation: Matrix3<f64>,
    /// Cached 4×4 world transform, derived from `(position, orientation)`.
    pub transform: Matrix4<f64>,
    /// Anisotropic mass matrix (diagonal in the body frame).
    pub mass: Matrix3<f64>,
    /// Inverse of the anisotropic mass matrix.
    pub inverse_mass: Matrix3<f64>,
    /// Inertia tensor in the body frame.
    pub inertia: Matrix3<f64>,
    /// Inverse of the inertia tensor.
    pub inverse_inertia: Matrix3<f64>,
    /// Centre-of-mass offset computed by the owning body's finalize step.
    pub centre_of_mass: Vector3<f64>,
}

impl Default for BodyState {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyState {
    /// Create a state at the origin, at rest, with unit mass and inertia.
    #[must_use]
    pub fn new() -> Self {
        let mut state = Self {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            rotation: Matrix3::identity(),
            inverse_rotation: Matrix3::identity(),
            transform: Matrix4::identity(),
            mass: Matrix3::identity(),
            inverse_mass: Matrix3::identity(),
            inertia: Matrix3::identity(),
            inverse_inertia: Matrix3::identity(),
            centre_of_mass: Vector3::zeros(),
        };
        state.update_transformations();
        state
    }

    /// Recompute the cached rotation matrix, its inverse and the 4×4 world
    /// transform from `(position, orientation)`.
    ///
    /// Must be called after any mutation of position or orientation, before
    /// the state is read by geometry queries or rendering.
    pub fn update_transformations(&mut self) {
        self.rotation = self.orientation.to_rotation_matrix().into_inner();
        // orthonormal, so the inverse is the transpose
        self.inverse_rotation = self.rotation.transpose();
        self.transform =
            Isometry3::from_parts(self.position.coords.into(), self.orientation).to_homogeneous();
    }

    /// Assign a uniform mass `m`, filling both the mass matrix and its
    /// inverse. `m` must be nonzero.
    pub fn set_uniform_mass(&mut self, m: f64) {
        self.mass = Matrix3::from_diagonal_element(m);
        self.inverse_mass = Matrix3::from_diagonal_element(1.0 / m);
    }

    /// Transform a point from body to world coordinates.
    #[must_use]
    pub fn to_world(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a point from world to body coordinates.
    #[must_use]
    pub fn to_model(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.inverse_rotation * (world - self.position))
    }

    /// Rotate a vector from body to world coordinates (no translation).
    #[must_use]
    pub fn to_world_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Rotate a vector from world to body coordinates (no translation).
    #[must_use]
    pub fn to_model_vector(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.inverse_rotation * world
    }

    /// Check that all primary state is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.orientation.coords.iter().all(|x| x.is_finite())
            && self.velocity.iter().all(|x| x.is_finite())
            && self.angular_velocity.iter().all(|x| x.is_finite())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_body_id_display() {
        let id = BodyId::new(7);
        assert_eq!(id.raw(), 7);
        assert_eq!(id.to_string(), "Body(7)");
        let id2: BodyId = 7.into();
        assert_eq!(id, id2);
    }

    #[test]
    fn test_default_state_is_identity() {
        let state = BodyState::new();
        assert_relative_eq!(state.rotation, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(state.transform, Matrix4::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_update_transformations_matches_orientation() {
        let mut state = BodyState::new();
        state.orientation =
            UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1);
        state.position = Point3::new(1.0, 2.0, 3.0);
        state.update_transformations();

        let expected = state.orientation.to_rotation_matrix().into_inner();
        assert_relative_eq!(state.rotation, expected, epsilon = 1e-12);
        assert_relative_eq!(
            state.inverse_rotation * state.rotation,
            Matrix3::identity(),
            epsilon = 1e-12
        );

        // the 4x4 transform carries the same rotation block and translation
        let block: Matrix3<f64> = state.transform.fixed_view::<3, 3>(0, 0).into();
        assert_relative_eq!(block, expected, epsilon = 1e-12);
        assert_relative_eq!(state.transform[(0, 3)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(state.transform[(2, 3)], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_world_model_round_trip() {
        let mut state = BodyState::new();
        state.position = Point3::new(-2.0, 0.5, 4.0);
        state.orientation = UnitQuaternion::from_euler_angles(0.1, 0.7, -0.4);
        state.update_transformations();

        let p = Point3::new(0.3, -1.2, 2.5);
        let there_and_back = state.to_model(&state.to_world(&p));
        assert_relative_eq!(there_and_back.coords, p.coords, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_mass() {
        let mut state = BodyState::new();
        state.set_uniform_mass(4.0);
        assert_relative_eq!(state.mass[(1, 1)], 4.0, epsilon = 1e-12);
        assert_relative_eq!(state.inverse_mass[(2, 2)], 0.25, epsilon = 1e-12);
    }
}
