//! Side-effect-free merit evaluation for the NCP.

use nalgebra::Vector3;
use tumble_dynamics::RigidBody;

use crate::constraint::NcpConstraint;

/// Evaluate the squared residual of one trial Gauss-Seidel sweep without
/// touching the rows or the bodies.
///
/// The sweep runs on scratch copies of the bodies' solver delta channels and
/// of the multipliers, with friction bounds taken instantaneously from the
/// trial multipliers. A value near zero means the current multipliers
/// already satisfy the complementarity conditions; line searches and
/// diagnostics can compare values between candidate states.
#[must_use]
pub fn merit(constraints: &[NcpConstraint], bodies: &[RigidBody]) -> f64 {
    let mut deltas: Vec<(Vector3<f64>, Vector3<f64>)> = bodies
        .iter()
        .map(|body| (body.delta_velocity, body.delta_omega))
        .collect();
    let mut trial: Vec<f64> = constraints.iter().map(|ci| ci.lambda).collect();

    let mut value = 0.0;
    for (i, ci) in constraints.iter().enumerate() {
        if ci.diagonal + ci.damper < 1e-12 || !ci.is_well_formed() {
            continue;
        }

        let (lower, upper) = match ci.coupling {
            Some(coupling) => {
                let limit = trial[coupling.index].abs() * coupling.mu;
                (-limit, limit)
            }
            None => (ci.lower, ci.upper),
        };

        let w = ci.j1.dot(&deltas[ci.body1].0)
            + ci.j2.dot(&deltas[ci.body1].1)
            + ci.j3.dot(&deltas[ci.body2].0)
            + ci.j4.dot(&deltas[ci.body2].1)
            + trial[i] * ci.damper;

        let unprojected = trial[i] + (-ci.b - w) / (ci.diagonal + ci.damper);
        let projected = lower.max(unprojected.min(upper));
        let delta = projected - trial[i];
        trial[i] = projected;
        value += delta * delta;

        deltas[ci.body1].0 += ci.b1 * delta;
        deltas[ci.body1].1 += ci.b2 * delta;
        deltas[ci.body2].0 += ci.b3 * delta;
        deltas[ci.body2].1 += ci.b4 * delta;
    }
    value
}
