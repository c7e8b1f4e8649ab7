//! The NCP row format shared by all constraint kinds.

use nalgebra::Vector3;
use tumble_dynamics::RigidBody;

/// Ties a row's force bounds to another row's multiplier.
///
/// Friction rows use this: their admissible force interval is
/// `±|λ_coupled| · μ`, the Coulomb cone linearized along one tangent
/// direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coupling {
    /// Index of the controlling row within the assembled row slice.
    pub index: usize,
    /// Friction coefficient scaling the controlling multiplier.
    pub mu: f64,
}

/// One row of the velocity-level complementarity problem.
///
/// The Jacobian is stored as four blocks `j1..j4` acting on the linear and
/// angular velocity of the first and second body. The `b1..b4` blocks cache
/// the mass-weighted Jacobian `M⁻¹ Jᵀ` so the solver can scatter a
/// multiplier change into body velocity deltas with four fused
/// multiply-adds. Bodies are referenced by their slot in the dense body
/// slice, not by ID.
#[derive(Debug, Clone)]
pub struct NcpConstraint {
    /// Slot of the first body.
    pub body1: usize,
    /// Slot of the second body.
    pub body2: usize,
    /// Jacobian block: linear velocity of body 1.
    pub j1: Vector3<f64>,
    /// Jacobian block: angular velocity of body 1.
    pub j2: Vector3<f64>,
    /// Jacobian block: linear velocity of body 2.
    pub j3: Vector3<f64>,
    /// Jacobian block: angular velocity of body 2.
    pub j4: Vector3<f64>,
    /// Mass-weighted Jacobian block for body 1 linear velocity.
    pub b1: Vector3<f64>,
    /// Mass-weighted Jacobian block for body 1 angular velocity.
    pub b2: Vector3<f64>,
    /// Mass-weighted Jacobian block for body 2 linear velocity.
    pub b3: Vector3<f64>,
    /// Mass-weighted Jacobian block for body 2 angular velocity.
    pub b4: Vector3<f64>,
    /// Right-hand side: target relative velocity plus correction terms.
    pub b: f64,
    /// Diagonal of the effective-mass matrix, `J M⁻¹ Jᵀ` for this row.
    pub diagonal: f64,
    /// Constraint-force damping added to the diagonal.
    pub damper: f64,
    /// Lower force bound.
    pub lower: f64,
    /// Upper force bound.
    pub upper: f64,
    /// Accumulated multiplier (warm-startable).
    pub lambda: f64,
    /// Optional friction coupling to another row.
    pub coupling: Option<Coupling>,
    /// Cached external-delta contribution, filled in by the solver.
    pub fext: f64,
    /// Last projected Gauss-Seidel increment, used as the CG residual.
    pub residual: f64,
    /// Conjugate search direction.
    pub direction: f64,
}

impl NcpConstraint {
    /// Create a zeroed row between two body slots with unbounded force.
    #[must_use]
    pub fn new(body1: usize, body2: usize) -> Self {
        Self {
            body1,
            body2,
            j1: Vector3::zeros(),
            j2: Vector3::zeros(),
            j3: Vector3::zeros(),
            j4: Vector3::zeros(),
            b1: Vector3::zeros(),
            b2: Vector3::zeros(),
            b3: Vector3::zeros(),
            b4: Vector3::zeros(),
            b: 0.0,
            diagonal: 0.0,
            damper: 0.0,
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            lambda: 0.0,
            coupling: None,
            fext: 0.0,
            residual: 0.0,
            direction: 0.0,
        }
    }

    /// Compute the mass-weighted blocks and the diagonal from the current
    /// body mass properties. Fixed bodies contribute zero inverse mass.
    pub fn precondition(&mut self, bodies: &[RigidBody]) {
        let first = &bodies[self.body1];
        let second = &bodies[self.body2];

        if first.is_fixed() {
            self.b1 = Vector3::zeros();
            self.b2 = Vector3::zeros();
        } else {
            self.b1 = first.state.inverse_mass * self.j1;
            self.b2 = first.state.inverse_inertia * self.j2;
        }
        if second.is_fixed() {
            self.b3 = Vector3::zeros();
            self.b4 = Vector3::zeros();
        } else {
            self.b3 = second.state.inverse_mass * self.j3;
            self.b4 = second.state.inverse_inertia * self.j4;
        }

        self.diagonal = self.j1.dot(&self.b1)
            + self.j2.dot(&self.b2)
            + self.j3.dot(&self.b3)
            + self.j4.dot(&self.b4);
    }

    /// Check all numeric fields for `NaN`/`Inf`. Infinite bounds are legal.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let vectors = [
            self.j1, self.j2, self.j3, self.j4, self.b1, self.b2, self.b3, self.b4,
        ];
        vectors.iter().all(|v| v.iter().all(|x| x.is_finite()))
            && self.b.is_finite()
            && self.diagonal.is_finite()
            && self.damper.is_finite()
            && self.lambda.is_finite()
            && !self.lower.is_nan()
            && !self.upper.is_nan()
    }
}
