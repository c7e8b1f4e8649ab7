//! Projected Gauss-Seidel with nonsmooth nonlinear conjugate gradient
//! acceleration.

use tracing::warn;
use tumble_dynamics::RigidBody;
use tumble_types::{FrictionBoundPolicy, Result, SolverConfig};

use crate::constraint::NcpConstraint;

/// Minimum usable effective mass for a row. Below this the row connects two
/// fixed bodies or a degenerate Jacobian and is skipped.
const MIN_DIAGONAL: f64 = 1e-12;

/// Outcome of one solver invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverStats {
    /// Number of Gauss-Seidel sweeps performed.
    pub iterations: usize,
    /// Squared residual of the final sweep.
    pub residual: f64,
    /// Whether the residual dropped below the configured epsilon.
    pub converged: bool,
    /// Rows skipped due to non-finite data or vanishing diagonal.
    pub skipped_rows: usize,
}

/// Velocity-level NCP solver.
///
/// Each sweep performs projected Gauss-Seidel over the rows, projecting the
/// accumulated multipliers onto their (possibly coupling-dependent) bounds
/// and scattering the increments into the bodies' solver delta channels.
/// The per-row increments double as the residual of a nonlinear conjugate
/// gradient scheme: between sweeps the multipliers take an additional step
/// `β·d` along the running conjugate direction, with `β = r_new / r_old`.
/// Whenever `β` exceeds one the subspace is stale and the direction restarts
/// from the bare residual. The CG step may leave the feasible set; the next
/// sweep's projection pulls it back, which is what makes the scheme
/// nonsmooth.
///
/// The solver never fails: at the iteration budget it returns the best
/// multipliers found so far, with [`SolverStats::converged`] cleared.
#[derive(Debug, Clone)]
pub struct NonsmoothCg {
    config: SolverConfig,
}

impl NonsmoothCg {
    /// Create a solver, validating the configuration.
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The solver configuration.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Update friction bounds for row `i` from its coupled row's multiplier.
    fn apply_coupling(&self, constraints: &mut [NcpConstraint], i: usize) {
        if let Some(coupling) = constraints[i].coupling {
            let limit = constraints[coupling.index].lambda.abs() * coupling.mu;
            let ci = &mut constraints[i];
            match self.config.friction_bounds {
                FrictionBoundPolicy::Instantaneous => {
                    ci.lower = -limit;
                    ci.upper = limit;
                }
                FrictionBoundPolicy::Growing => {
                    ci.lower = ci.lower.min(-limit);
                    ci.upper = ci.upper.max(limit);
                }
            }
        }
    }

    /// Solve the assembled rows against the given dense body slice.
    ///
    /// Rows must be preconditioned and reference bodies by slot. Warm-start
    /// multipliers already stored in the rows are scattered into the bodies
    /// before the first sweep.
    pub fn solve(&self, constraints: &mut [NcpConstraint], bodies: &mut [RigidBody]) -> SolverStats {
        let mut skipped = 0usize;

        // prime each row: external-delta compensation, warm start, CG state
        for (i, ci) in constraints.iter_mut().enumerate() {
            ci.residual = 0.0;
            ci.direction = 0.0;
            if !ci.is_well_formed() || ci.diagonal + ci.damper < MIN_DIAGONAL {
                warn!(row = i, diagonal = ci.diagonal, "skipping degenerate constraint row");
                ci.lambda = 0.0;
                skipped += 1;
                continue;
            }

            let first = &bodies[ci.body1];
            let second = &bodies[ci.body2];
            ci.fext = ci.j1.dot(&first.external_delta_velocity)
                + ci.j2.dot(&first.external_delta_omega)
                + ci.j3.dot(&second.external_delta_velocity)
                + ci.j4.dot(&second.external_delta_omega);

            if ci.lambda != 0.0 {
                let lambda = ci.lambda;
                let (b1, b2, b3, b4) = (ci.b1, ci.b2, ci.b3, ci.b4);
                let (s1, s2) = (ci.body1, ci.body2);
                bodies[s1].delta_velocity += b1 * lambda;
                bodies[s1].delta_omega += b2 * lambda;
                bodies[s2].delta_velocity += b3 * lambda;
                bodies[s2].delta_omega += b4 * lambda;
            }
        }

        let mut rold = 0.0;
        let mut rnew;
        let mut iteration = 0usize;
        let mut converged = false;

        loop {
            rnew = 0.0;
            for i in 0..constraints.len() {
                self.apply_coupling(constraints, i);

                let ci = &mut constraints[i];
                if ci.diagonal + ci.damper < MIN_DIAGONAL || !ci.is_well_formed() {
                    ci.residual = 0.0;
                    continue;
                }

                let first = &bodies[ci.body1];
                let second = &bodies[ci.body2];
                let w = ci.j1.dot(&first.delta_velocity)
                    + ci.j2.dot(&first.delta_omega)
                    + ci.j3.dot(&second.delta_velocity)
                    + ci.j4.dot(&second.delta_omega)
                    + ci.lambda * ci.damper
                    + ci.fext;

                let unprojected = ci.lambda + (-ci.b - w) / (ci.diagonal + ci.damper);
                let projected = ci.lower.max(unprojected.min(ci.upper));
                let delta = projected - ci.lambda;
                ci.lambda = projected;
                ci.residual = delta;
                rnew += delta * delta;

                let (b1, b2, b3, b4) = (ci.b1, ci.b2, ci.b3, ci.b4);
                let (s1, s2) = (ci.body1, ci.body2);
                bodies[s1].delta_velocity += b1 * delta;
                bodies[s1].delta_omega += b2 * delta;
                bodies[s2].delta_velocity += b3 * delta;
                bodies[s2].delta_omega += b4 * delta;
            }

            if iteration >= self.config.max_iterations {
                break;
            }
            if iteration == 0 {
                rold = rnew;
                if rnew.abs() < self.config.epsilon {
                    converged = true;
                    break;
                }
            } else {
                if rold.abs() < self.config.epsilon {
                    converged = true;
                    break;
                }
                if (rold - rnew).abs() < self.config.stagnation {
                    converged = rnew.abs() < self.config.epsilon;
                    break;
                }
            }

            // conjugate gradient step on the multipliers
            let beta = rnew / rold;
            if beta > 1.0 {
                // stale subspace: restart the direction from the residual
                for ci in constraints.iter_mut() {
                    ci.direction = ci.residual;
                }
            } else {
                for ci in constraints.iter_mut() {
                    let alpha = beta * ci.direction;
                    if alpha != 0.0 {
                        ci.lambda += alpha;
                        let (b1, b2, b3, b4) = (ci.b1, ci.b2, ci.b3, ci.b4);
                        let (s1, s2) = (ci.body1, ci.body2);
                        bodies[s1].delta_velocity += b1 * alpha;
                        bodies[s1].delta_omega += b2 * alpha;
                        bodies[s2].delta_velocity += b3 * alpha;
                        bodies[s2].delta_omega += b4 * alpha;
                    }
                    ci.direction = alpha + ci.residual;
                }
            }

            rold = rnew;
            iteration += 1;
        }

        SolverStats {
            iterations: iteration,
            residual: rnew,
            converged,
            skipped_rows: skipped,
        }
    }
}
